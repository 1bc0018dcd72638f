//! Data authorization cache service
//!
//! Materializes row filter rules from the rule store into the rule cache,
//! keyed by (role name, entity type name).
//!
//! ```text
//! AssociationProvider ──► resolve role / entity type names ──► decode payload
//!                                                                   │
//!                                         CacheKey::derive ◄────────┘
//!                                                │
//!                                            RuleCache::set
//! ```
//!
//! A lookup miss is `Ok(None)`. Whether a miss means "no restriction" or
//! "deny all" is decided by the caller applying the filter, not here.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::RuleCache;
use crate::config::{DataAuthConfig, FailurePolicy};
use crate::error::{DataAuthError, Result};
use crate::filter::FilterGroup;
use crate::key::{CacheKey, KEY_PREFIX};
use crate::payload;
use crate::store::RuleSources;
use crate::types::{EntityRoleAssociation, EntityTypeId, RoleId};

/// An association left out of a rebuild
#[derive(Debug, Clone)]
pub struct SkippedAssociation {
    pub role_id: RoleId,
    pub entity_type_id: EntityTypeId,
    pub reason: String,
}

/// Outcome of a rebuild
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Associations written to the cache
    pub cached: usize,

    /// Associations not written under `FailurePolicy::Skip`
    pub skipped: Vec<SkippedAssociation>,

    /// Stale entries removed (pruning only)
    pub pruned: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Row-level data authorization cache
///
/// Holds no mutable state of its own; all state lives in the rule store and
/// the rule cache, so the service can be shared freely across tasks.
pub struct DataAuthCache {
    sources: RuleSources,
    cache: Arc<dyn RuleCache>,
    config: DataAuthConfig,
}

impl DataAuthCache {
    /// Create a new cache service
    pub fn new(config: DataAuthConfig, sources: RuleSources, cache: Arc<dyn RuleCache>) -> Self {
        info!(
            "DataAuthCache initialized with key_scheme={:?}, failure_policy={:?}, prune_stale={}",
            config.key_scheme, config.failure_policy, config.prune_stale
        );

        Self {
            sources,
            cache,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &DataAuthConfig {
        &self.config
    }

    /// Cache key for a role name and entity type name under the configured scheme
    pub fn cache_key(&self, role_name: &str, entity_type_name: &str) -> CacheKey {
        CacheKey::derive(self.config.key_scheme, role_name, entity_type_name)
    }

    /// Rebuild cache entries from every non-disabled association.
    ///
    /// Entries are added or overwritten. Entries whose association was deleted
    /// or disabled are left in place unless `prune_stale` is set. Pruning never
    /// removes the entry of an association skipped for a malformed payload.
    pub async fn build_caches(&self) -> Result<BuildReport> {
        let started_at = Utc::now();

        let snapshot = if self.config.prune_stale {
            Some(self.cache.keys_with_prefix(KEY_PREFIX).await?)
        } else {
            None
        };

        let associations = self.sources.associations.list_active_associations().await?;

        let mut role_names: HashMap<RoleId, String> = HashMap::new();
        let mut type_names: HashMap<EntityTypeId, String> = HashMap::new();
        let mut written: HashMap<CacheKey, (RoleId, EntityTypeId)> = HashMap::new();
        let mut retained: HashSet<CacheKey> = HashSet::new();
        let mut skipped = Vec::new();
        let mut cached = 0;

        for association in associations.iter().filter(|a| !a.is_disabled) {
            let (key, role_name, type_name) = match self
                .resolve_key(association, &mut role_names, &mut type_names)
                .await
            {
                Ok(resolved) => resolved,
                Err(e) => {
                    self.skip_or_abort(association, e, &mut skipped)?;
                    continue;
                }
            };

            let group = match decode_association(association) {
                Ok(group) => group,
                Err(e) => {
                    self.skip_or_abort(association, e, &mut skipped)?;
                    // The last good rule for this key stays until the payload is fixed
                    retained.insert(key);
                    continue;
                }
            };

            if let Some((other_role, other_type)) = written.get(&key) {
                warn!(
                    "Cache key {} collides: role {} / entity type {} overwrites role {} / entity type {}",
                    key, association.role_id, association.entity_type_id, other_role, other_type
                );
            }

            self.cache.set(key.as_str(), group).await?;
            cached += 1;
            debug!(
                "Cached data rule for role '{}' and entity type '{}'",
                role_name, type_name
            );
            written.insert(key, association.key());
        }

        let mut pruned = 0;
        if let Some(existing) = snapshot {
            let keep: HashSet<&str> = written
                .keys()
                .chain(retained.iter())
                .map(CacheKey::as_str)
                .collect();
            for key in existing.iter().filter(|k| !keep.contains(k.as_str())) {
                if self.cache.remove(key).await? {
                    pruned += 1;
                    debug!("Pruned stale data rule {}", key);
                }
            }
        }

        info!(
            "Data authorization: cached {} filter rules ({} skipped, {} pruned)",
            cached,
            skipped.len(),
            pruned
        );

        Ok(BuildReport {
            cached,
            skipped,
            pruned,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Remove the entry for a role name and entity type name.
    ///
    /// Removing an absent entry is a no-op.
    pub async fn remove_cache(&self, role_name: &str, entity_type_name: &str) -> Result<()> {
        let key = self.checked_key(role_name, entity_type_name)?;
        let removed = self.cache.remove(key.as_str()).await?;
        debug!(
            "Removed data rule for role '{}' and entity type '{}' (present: {})",
            role_name, entity_type_name, removed
        );
        Ok(())
    }

    /// Look up the filter group for a role name and entity type name.
    ///
    /// Returns `Ok(None)` when no rule is cached.
    pub async fn get_filter_group(&self, role_name: &str, entity_type_name: &str) -> Result<Option<FilterGroup>> {
        let key = self.checked_key(role_name, entity_type_name)?;
        self.cache.get(key.as_str()).await
    }

    /// Write a filter group directly, bypassing the store
    pub async fn set_filter_group(&self, role_name: &str, entity_type_name: &str, group: FilterGroup) -> Result<()> {
        let key = self.checked_key(role_name, entity_type_name)?;
        self.cache.set(key.as_str(), group).await?;
        debug!(
            "Set data rule for role '{}' and entity type '{}'",
            role_name, entity_type_name
        );
        Ok(())
    }

    fn checked_key(&self, role_name: &str, entity_type_name: &str) -> Result<CacheKey> {
        if role_name.is_empty() {
            return Err(DataAuthError::InvalidInput("role name must not be empty".to_string()));
        }
        if entity_type_name.is_empty() {
            return Err(DataAuthError::InvalidInput("entity type name must not be empty".to_string()));
        }
        Ok(self.cache_key(role_name, entity_type_name))
    }

    /// Resolve the role and entity type names of one association into its key
    async fn resolve_key(
        &self,
        association: &EntityRoleAssociation,
        role_names: &mut HashMap<RoleId, String>,
        type_names: &mut HashMap<EntityTypeId, String>,
    ) -> Result<(CacheKey, String, String)> {
        let role_name = match role_names.get(&association.role_id) {
            Some(name) => name.clone(),
            None => {
                let name = self
                    .sources
                    .roles
                    .role_name(&association.role_id)
                    .await?
                    .ok_or_else(|| DataAuthError::DanglingReference {
                        kind: "role",
                        id: association.role_id.clone(),
                    })?;
                role_names.insert(association.role_id.clone(), name.clone());
                name
            }
        };

        let type_name = match type_names.get(&association.entity_type_id) {
            Some(name) => name.clone(),
            None => {
                let name = self
                    .sources
                    .entity_types
                    .entity_type_name(&association.entity_type_id)
                    .await?
                    .ok_or_else(|| DataAuthError::DanglingReference {
                        kind: "entity type",
                        id: association.entity_type_id.to_string(),
                    })?;
                type_names.insert(association.entity_type_id, name.clone());
                name
            }
        };

        let key = self.cache_key(&role_name, &type_name);
        Ok((key, role_name, type_name))
    }

    /// Record a per-association failure under `Skip`, or hand the error back
    fn skip_or_abort(
        &self,
        association: &EntityRoleAssociation,
        error: DataAuthError,
        skipped: &mut Vec<SkippedAssociation>,
    ) -> Result<()> {
        if !error.is_per_association() || self.config.failure_policy == FailurePolicy::Abort {
            return Err(error);
        }

        warn!(
            "Skipping data rule for role {} and entity type {}: {}",
            association.role_id, association.entity_type_id, error
        );
        skipped.push(SkippedAssociation {
            role_id: association.role_id.clone(),
            entity_type_id: association.entity_type_id,
            reason: error.to_string(),
        });
        Ok(())
    }
}

fn decode_association(association: &EntityRoleAssociation) -> Result<FilterGroup> {
    payload::decode(&association.rule_payload).map_err(|e| DataAuthError::Deserialization {
        role_id: association.role_id.clone(),
        entity_type_id: association.entity_type_id.to_string(),
        message: e.to_string(),
    })
}
