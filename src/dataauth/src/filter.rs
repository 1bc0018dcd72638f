//! Row filter groups
//!
//! A [`FilterGroup`] describes which rows of an entity type a role may see.
//! The cache treats it as an opaque value: it is stored, copied and
//! serialized, never evaluated.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the members of a group are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterOperate {
    #[default]
    And,
    Or,
}

/// Comparison applied by a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
}

/// A single field comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    /// Property path on the entity (e.g., "status", "owner.id")
    pub field: String,

    /// Comparison operand
    #[serde(default)]
    pub value: Value,

    /// Comparison operator
    pub operate: FilterOperator,
}

impl FilterRule {
    /// Create a new rule
    pub fn new(field: impl Into<String>, operate: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operate,
        }
    }
}

/// A group of rules and nested groups joined by one combinator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    /// Rules in this group
    #[serde(default)]
    pub rules: Vec<FilterRule>,

    /// Nested groups
    #[serde(default)]
    pub groups: Vec<FilterGroup>,

    /// Combinator for rules and groups
    #[serde(default)]
    pub operate: FilterOperate,
}

impl FilterGroup {
    /// Empty group whose members must all match
    pub fn and() -> Self {
        Self::default()
    }

    /// Empty group where any member may match
    pub fn or() -> Self {
        Self {
            operate: FilterOperate::Or,
            ..Self::default()
        }
    }

    /// Add a rule
    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a nested group
    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// True when the group has no rules at any depth
    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }

    /// Number of rules including nested groups
    pub fn rule_count(&self) -> usize {
        self.rules.len() + self.groups.iter().map(FilterGroup::rule_count).sum::<usize>()
    }
}
