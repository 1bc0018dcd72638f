//! Core data authorization types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique role identifier
pub type RoleId = String;

/// Unique entity type identifier
pub type EntityTypeId = Uuid;

/// A named authorization role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier
    pub id: RoleId,

    /// Role name, embedded verbatim in cache keys
    pub name: String,
}

impl Role {
    /// Create a new role
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Metadata for a data entity type subject to row filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDescriptor {
    /// Entity type identifier
    pub id: EntityTypeId,

    /// Fully-qualified type name (e.g., "Billing.Invoice")
    pub type_name: String,
}

impl EntityTypeDescriptor {
    /// Create a descriptor with a fresh identifier
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_name: type_name.into(),
        }
    }
}

/// Binding of one role to one entity type, carrying the row filter for that pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRoleAssociation {
    /// Owning role
    pub role_id: RoleId,

    /// Filtered entity type
    pub entity_type_id: EntityTypeId,

    /// Serialized filter group
    pub rule_payload: String,

    /// Disabled associations are kept in the store but never cached
    #[serde(default)]
    pub is_disabled: bool,
}

impl EntityRoleAssociation {
    /// Create an enabled association
    pub fn new(
        role_id: impl Into<RoleId>,
        entity_type_id: EntityTypeId,
        rule_payload: impl Into<String>,
    ) -> Self {
        Self {
            role_id: role_id.into(),
            entity_type_id,
            rule_payload: rule_payload.into(),
            is_disabled: false,
        }
    }

    /// Mark the association as disabled
    pub fn disabled(mut self) -> Self {
        self.is_disabled = true;
        self
    }

    /// Store identity of the association
    pub fn key(&self) -> (RoleId, EntityTypeId) {
        (self.role_id.clone(), self.entity_type_id)
    }
}
