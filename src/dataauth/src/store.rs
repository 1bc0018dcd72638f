//! Rule store gateway
//!
//! Read-only query surface over the persisted associations, roles and entity
//! type metadata. The cache service depends on three narrow capabilities so
//! any storage schema can be plugged in.

use crate::error::{DataAuthError, Result};
use crate::types::{EntityRoleAssociation, EntityTypeDescriptor, EntityTypeId, Role, RoleId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRuleStore;

/// Source of associations to materialize
#[async_trait]
pub trait AssociationProvider: Send + Sync {
    /// List every association that is not disabled
    async fn list_active_associations(&self) -> Result<Vec<EntityRoleAssociation>>;
}

/// Resolves a role identifier to its name
#[async_trait]
pub trait RoleNameResolver: Send + Sync {
    /// Role name, or `None` if the role does not exist
    async fn role_name(&self, role_id: &RoleId) -> Result<Option<String>>;
}

/// Resolves an entity type identifier to its fully-qualified name
#[async_trait]
pub trait EntityTypeNameResolver: Send + Sync {
    /// Type name, or `None` if the entity type does not exist
    async fn entity_type_name(&self, entity_type_id: &EntityTypeId) -> Result<Option<String>>;
}

/// The three store capabilities a cache service is built from
#[derive(Clone)]
pub struct RuleSources {
    pub associations: Arc<dyn AssociationProvider>,
    pub roles: Arc<dyn RoleNameResolver>,
    pub entity_types: Arc<dyn EntityTypeNameResolver>,
}

impl RuleSources {
    /// Use one store for all three capabilities
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AssociationProvider + RoleNameResolver + EntityTypeNameResolver + 'static,
    {
        Self {
            associations: store.clone(),
            roles: store.clone(),
            entity_types: store,
        }
    }
}

/// In-memory rule store implementation
pub struct InMemoryRuleStore {
    roles: Arc<RwLock<HashMap<RoleId, Role>>>,
    entity_types: Arc<RwLock<HashMap<EntityTypeId, EntityTypeDescriptor>>>,
    associations: Arc<RwLock<HashMap<(RoleId, EntityTypeId), EntityRoleAssociation>>>,
    available: AtomicBool,
}

impl InMemoryRuleStore {
    /// Create a new in-memory rule store
    pub fn new() -> Self {
        Self {
            roles: Arc::new(RwLock::new(HashMap::new())),
            entity_types: Arc::new(RwLock::new(HashMap::new())),
            associations: Arc::new(RwLock::new(HashMap::new())),
            available: AtomicBool::new(true),
        }
    }

    /// Insert or replace a role
    pub async fn upsert_role(&self, role: Role) {
        let mut roles = self.roles.write().await;
        roles.insert(role.id.clone(), role);
    }

    /// Insert or replace an entity type
    pub async fn upsert_entity_type(&self, entity_type: EntityTypeDescriptor) {
        let mut entity_types = self.entity_types.write().await;
        entity_types.insert(entity_type.id, entity_type);
    }

    /// Insert or replace the association for its (role, entity type) pair
    pub async fn upsert_association(&self, association: EntityRoleAssociation) {
        let mut associations = self.associations.write().await;
        associations.insert(association.key(), association);
    }

    /// Enable or disable an association; returns false if it does not exist
    pub async fn set_disabled(&self, role_id: &str, entity_type_id: EntityTypeId, disabled: bool) -> bool {
        let mut associations = self.associations.write().await;
        match associations.get_mut(&(role_id.to_string(), entity_type_id)) {
            Some(assoc) => {
                assoc.is_disabled = disabled;
                true
            }
            None => false,
        }
    }

    /// Delete an association
    pub async fn remove_association(&self, role_id: &str, entity_type_id: EntityTypeId) -> Option<EntityRoleAssociation> {
        let mut associations = self.associations.write().await;
        associations.remove(&(role_id.to_string(), entity_type_id))
    }

    /// Simulate the store going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DataAuthError::StoreUnavailable("in-memory store is offline".to_string()))
        }
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssociationProvider for InMemoryRuleStore {
    async fn list_active_associations(&self) -> Result<Vec<EntityRoleAssociation>> {
        self.check_available()?;
        let associations = self.associations.read().await;
        Ok(associations
            .values()
            .filter(|a| !a.is_disabled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleNameResolver for InMemoryRuleStore {
    async fn role_name(&self, role_id: &RoleId) -> Result<Option<String>> {
        self.check_available()?;
        let roles = self.roles.read().await;
        Ok(roles.get(role_id).map(|r| r.name.clone()))
    }
}

#[async_trait]
impl EntityTypeNameResolver for InMemoryRuleStore {
    async fn entity_type_name(&self, entity_type_id: &EntityTypeId) -> Result<Option<String>> {
        self.check_available()?;
        let entity_types = self.entity_types.read().await;
        Ok(entity_types.get(entity_type_id).map(|t| t.type_name.clone()))
    }
}
