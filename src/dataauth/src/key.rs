//! Cache key derivation
//!
//! Keys have the form `Security_EntityRole_{role}_{entity_type}`. Under
//! [`KeyScheme::Escaped`] the two components are percent-encoded for `%` and
//! `_` only, so names without either character yield the same bytes as the
//! legacy format while distinct pairs never share a key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataAuthError;

/// Prefix shared by every data authorization cache key
pub const KEY_PREFIX: &str = "Security_EntityRole_";

const SEPARATOR: char = '_';

/// Key naming scheme
///
/// Switching between schemes changes the key of every pair whose role or entity
/// type name contains `_` or `%`. A cache populated under `Legacy` keeps those
/// entries under their old keys: lookups through `Escaped`, the default, miss
/// them until the next rebuild, and pruning then removes them. Deployments that
/// share a cache with other readers of the literal format should select
/// `Legacy` (`DATAAUTH_KEY_SCHEME=legacy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    /// Components embedded verbatim. Not injective when names contain `_`.
    Legacy,
    /// `%` and `_` in components are percent-encoded.
    #[default]
    Escaped,
}

impl FromStr for KeyScheme {
    type Err = DataAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(KeyScheme::Legacy),
            "escaped" => Ok(KeyScheme::Escaped),
            other => Err(DataAuthError::Config(format!("unknown key scheme '{}'", other))),
        }
    }
}

/// Derived cache key for one (role name, entity type name) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a role name and entity type name
    pub fn derive(scheme: KeyScheme, role_name: &str, entity_type_name: &str) -> Self {
        let mut key = String::with_capacity(
            KEY_PREFIX.len() + role_name.len() + entity_type_name.len() + 1,
        );
        key.push_str(KEY_PREFIX);
        match scheme {
            KeyScheme::Legacy => {
                key.push_str(role_name);
                key.push(SEPARATOR);
                key.push_str(entity_type_name);
            }
            KeyScheme::Escaped => {
                escape_into(&mut key, role_name);
                key.push(SEPARATOR);
                escape_into(&mut key, entity_type_name);
            }
        }
        Self(key)
    }

    /// Recover `(role name, entity type name)` from a key.
    ///
    /// Exact for escaped keys. Legacy keys are split at the first separator
    /// after the prefix, which is wrong for role names containing `_`.
    pub fn parse(scheme: KeyScheme, key: &str) -> Option<(String, String)> {
        let rest = key.strip_prefix(KEY_PREFIX)?;
        match scheme {
            KeyScheme::Legacy => {
                let (role, entity_type) = rest.split_once(SEPARATOR)?;
                Some((role.to_string(), entity_type.to_string()))
            }
            KeyScheme::Escaped => {
                let (role, entity_type) = rest.split_once(SEPARATOR)?;
                if entity_type.contains(SEPARATOR) {
                    return None;
                }
                Some((unescape(role)?, unescape(entity_type)?))
            }
        }
    }

    /// Key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key into its string form
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn escape_into(out: &mut String, component: &str) {
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            '_' => out.push_str("%5F"),
            c => out.push(c),
        }
    }
}

fn unescape(component: &str) -> Option<String> {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let code = rest.get(idx + 1..idx + 3)?;
        match code {
            "25" => out.push('%'),
            "5F" => out.push('_'),
            _ => return None,
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_legacy_format_is_bit_exact() {
        let key = CacheKey::derive(KeyScheme::Legacy, "Auditor", "Billing.Invoice");
        assert_eq!(key.as_str(), "Security_EntityRole_Auditor_Billing.Invoice");
    }

    #[test]
    fn test_escaped_matches_legacy_without_separators() {
        let legacy = CacheKey::derive(KeyScheme::Legacy, "Auditor", "Billing.Invoice");
        let escaped = CacheKey::derive(KeyScheme::Escaped, "Auditor", "Billing.Invoice");
        assert_eq!(legacy, escaped);
    }

    #[test]
    fn test_legacy_collision_is_resolved_by_escaping() {
        // ("a_b", "c") and ("a", "b_c") collide in the legacy format
        let l1 = CacheKey::derive(KeyScheme::Legacy, "a_b", "c");
        let l2 = CacheKey::derive(KeyScheme::Legacy, "a", "b_c");
        assert_eq!(l1, l2);

        let e1 = CacheKey::derive(KeyScheme::Escaped, "a_b", "c");
        let e2 = CacheKey::derive(KeyScheme::Escaped, "a", "b_c");
        assert_ne!(e1, e2);
        assert_eq!(e1.as_str(), "Security_EntityRole_a%5Fb_c");
    }

    #[test]
    fn test_default_scheme_moves_underscored_keys() {
        let legacy = CacheKey::derive(KeyScheme::Legacy, "Regional_Auditor", "Invoice");
        let default = CacheKey::derive(KeyScheme::default(), "Regional_Auditor", "Invoice");

        assert_eq!(legacy.as_str(), "Security_EntityRole_Regional_Auditor_Invoice");
        assert_eq!(default.as_str(), "Security_EntityRole_Regional%5FAuditor_Invoice");
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let a = CacheKey::derive(KeyScheme::Escaped, "auditor", "Invoice");
        let b = CacheKey::derive(KeyScheme::Escaped, "Auditor", "Invoice");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse() {
        let key = CacheKey::derive(KeyScheme::Escaped, "team_lead", "100%_Sales");
        assert_eq!(
            CacheKey::parse(KeyScheme::Escaped, key.as_str()),
            Some(("team_lead".to_string(), "100%_Sales".to_string()))
        );

        assert_eq!(
            CacheKey::parse(KeyScheme::Legacy, "Security_EntityRole_Auditor_Invoice"),
            Some(("Auditor".to_string(), "Invoice".to_string()))
        );
        assert_eq!(CacheKey::parse(KeyScheme::Escaped, "Other_prefix_x_y"), None);
        assert_eq!(CacheKey::parse(KeyScheme::Escaped, "Security_EntityRole_a%zz_b"), None);
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("legacy".parse::<KeyScheme>().unwrap(), KeyScheme::Legacy);
        assert_eq!(" Escaped ".parse::<KeyScheme>().unwrap(), KeyScheme::Escaped);
        assert!("base64".parse::<KeyScheme>().is_err());
    }

    proptest! {
        #[test]
        fn prop_key_is_deterministic(role in ".{1,24}", entity in ".{1,24}") {
            let a = CacheKey::derive(KeyScheme::Escaped, &role, &entity);
            let b = CacheKey::derive(KeyScheme::Escaped, &role, &entity);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_escaped_key_is_injective(
            r1 in "[a-c_%]{1,6}", t1 in "[a-c_%]{1,6}",
            r2 in "[a-c_%]{1,6}", t2 in "[a-c_%]{1,6}",
        ) {
            let k1 = CacheKey::derive(KeyScheme::Escaped, &r1, &t1);
            let k2 = CacheKey::derive(KeyScheme::Escaped, &r2, &t2);
            prop_assert_eq!(k1 == k2, (r1, t1) == (r2, t2));
        }

        #[test]
        fn prop_escaped_key_parses_back(role in ".{1,24}", entity in ".{1,24}") {
            let key = CacheKey::derive(KeyScheme::Escaped, &role, &entity);
            prop_assert_eq!(CacheKey::parse(KeyScheme::Escaped, key.as_str()), Some((role, entity)));
        }
    }
}
