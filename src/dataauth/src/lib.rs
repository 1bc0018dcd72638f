//! # CretoAI Data Authorization Cache
//!
//! Row-level data access rules, materialized per (role, entity type) from the
//! rule store into a key-value cache.
//!
//! ## Features
//!
//! - **Pluggable rule store** via narrow async traits (in-memory and PostgreSQL provided)
//! - **Deterministic cache keys** of the form `Security_EntityRole_{role}_{entity_type}`
//! - **Full rebuild**, single-entry invalidation and lookup
//! - **Configurable failure policy** for malformed rules
//! - **Optional pruning** of entries whose association disappeared
//!
//! ## Example
//!
//! ```rust
//! use cretoai_dataauth::{
//!     DataAuthCache, DataAuthConfig, EntityRoleAssociation, EntityTypeDescriptor,
//!     InMemoryRuleStore, MemoryRuleCache, Role, RuleSources,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryRuleStore::new());
//!     let invoice = EntityTypeDescriptor::new("Billing.Invoice");
//!     store.upsert_role(Role::new("role-1", "Auditor")).await;
//!     store.upsert_entity_type(invoice.clone()).await;
//!     store.upsert_association(EntityRoleAssociation::new(
//!         "role-1",
//!         invoice.id,
//!         r#"{"rules":[{"field":"status","value":"approved","operate":"Equal"}]}"#,
//!     )).await;
//!
//!     let config = DataAuthConfig::from_env()?;
//!     let cache = Arc::new(MemoryRuleCache::from_config(&config));
//!     let service = DataAuthCache::new(config, RuleSources::from_store(store), cache);
//!
//!     service.build_caches().await?;
//!
//!     if let Some(group) = service.get_filter_group("Auditor", "Billing.Invoice").await? {
//!         println!("Auditor sees invoices matching {} rule(s)", group.rule_count());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod key;
pub mod payload;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, MemoryRuleCache, RuleCache};
pub use config::{DataAuthConfig, FailurePolicy};
pub use error::{DataAuthError, Result};
pub use filter::{FilterGroup, FilterOperate, FilterOperator, FilterRule};
pub use key::{CacheKey, KeyScheme, KEY_PREFIX};
pub use service::{BuildReport, DataAuthCache, SkippedAssociation};
pub use store::{
    AssociationProvider, EntityTypeNameResolver, InMemoryRuleStore, RoleNameResolver, RuleSources,
};
pub use types::{EntityRoleAssociation, EntityTypeDescriptor, EntityTypeId, Role, RoleId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
