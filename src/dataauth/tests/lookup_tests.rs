//! Lookup and invalidation tests
//!
//! Miss semantics, idempotent invalidation, backend failures and lookups
//! racing a rebuild.

use async_trait::async_trait;
use cretoai_dataauth::{
    payload, DataAuthCache, DataAuthConfig, DataAuthError, EntityRoleAssociation,
    EntityTypeDescriptor, FilterGroup, FilterOperator, FilterRule, InMemoryRuleStore,
    MemoryRuleCache, Result, Role, RuleCache, RuleSources,
};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<InMemoryRuleStore>, Arc<MemoryRuleCache>, DataAuthCache) {
    let store = Arc::new(InMemoryRuleStore::new());
    let config = DataAuthConfig::default();
    let cache = Arc::new(MemoryRuleCache::from_config(&config));
    let service = DataAuthCache::new(config, RuleSources::from_store(store.clone()), cache.clone());
    (store, cache, service)
}

fn approved_only() -> FilterGroup {
    FilterGroup::and().with_rule(FilterRule::new("status", FilterOperator::Equal, "approved"))
}

#[tokio::test]
async fn test_lookup_on_empty_cache_is_a_miss() {
    let (_, _, service) = setup();

    let result = service.get_filter_group("Nobody", "Ghost").await;
    assert!(matches!(result, Ok(None)), "A miss is not an error");
}

#[tokio::test]
async fn test_lookup_with_backend_down_is_an_error() {
    let (_, cache, service) = setup();
    cache.set_available(false);

    let err = service.get_filter_group("Nobody", "Ghost").await.unwrap_err();
    assert!(matches!(err, DataAuthError::CacheUnavailable(_)));
}

#[tokio::test]
async fn test_invalidation_after_disable_without_rebuild() {
    let (store, _, service) = setup();
    let invoice = EntityTypeDescriptor::new("Invoice");
    store.upsert_role(Role::new("r1", "Auditor")).await;
    store.upsert_entity_type(invoice.clone()).await;
    store
        .upsert_association(EntityRoleAssociation::new(
            "r1",
            invoice.id,
            payload::encode(&approved_only()).unwrap(),
        ))
        .await;
    service.build_caches().await.unwrap();
    assert!(service.get_filter_group("Auditor", "Invoice").await.unwrap().is_some());

    // Administrator disables the association and invalidates its entry
    store.set_disabled("r1", invoice.id, true).await;
    service.remove_cache("Auditor", "Invoice").await.unwrap();

    assert!(service.get_filter_group("Auditor", "Invoice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalidation_is_idempotent() {
    let (_, cache, service) = setup();
    service
        .set_filter_group("Auditor", "Invoice", approved_only())
        .await
        .unwrap();

    service.remove_cache("Auditor", "Invoice").await.unwrap();
    service.remove_cache("Auditor", "Invoice").await.unwrap();

    assert!(service.get_filter_group("Auditor", "Invoice").await.unwrap().is_none());
    assert_eq!(cache.stats().removals, 1);
}

#[tokio::test]
async fn test_invalidation_only_touches_its_key() {
    let (_, _, service) = setup();
    service.set_filter_group("Auditor", "Invoice", approved_only()).await.unwrap();
    service.set_filter_group("Auditor", "Receipt", approved_only()).await.unwrap();

    service.remove_cache("Auditor", "Invoice").await.unwrap();

    assert!(service.get_filter_group("Auditor", "Invoice").await.unwrap().is_none());
    assert!(service.get_filter_group("Auditor", "Receipt").await.unwrap().is_some());
}

#[tokio::test]
async fn test_invalidation_with_backend_down_is_an_error() {
    let (_, cache, service) = setup();
    cache.set_available(false);

    let err = service.remove_cache("Auditor", "Invoice").await.unwrap_err();
    assert!(matches!(err, DataAuthError::CacheUnavailable(_)));
}

#[tokio::test]
async fn test_set_then_lookup_observes_new_value() {
    let (_, _, service) = setup();
    service.set_filter_group("Auditor", "Invoice", FilterGroup::or()).await.unwrap();
    service.set_filter_group("Auditor", "Invoice", approved_only()).await.unwrap();

    assert_eq!(
        service.get_filter_group("Auditor", "Invoice").await.unwrap(),
        Some(approved_only())
    );
}

// ============================================================================
// CONCURRENT ACCESS
// ============================================================================

/// Cache whose writes yield to the scheduler, widening the rebuild window
struct SlowCache {
    inner: MemoryRuleCache,
}

#[async_trait]
impl RuleCache for SlowCache {
    async fn set(&self, key: &str, group: FilterGroup) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.inner.set(key, group).await
    }

    async fn get(&self, key: &str) -> Result<Option<FilterGroup>> {
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.inner.remove(key).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lookups_during_rebuild_see_old_or_new_value() {
    let store = Arc::new(InMemoryRuleStore::new());
    let service = Arc::new(DataAuthCache::new(
        DataAuthConfig::default(),
        RuleSources::from_store(store.clone()),
        Arc::new(SlowCache { inner: MemoryRuleCache::new() }),
    ));

    let old = FilterGroup::or();
    let new = approved_only();
    let type_names: Vec<String> = (0..20).map(|i| format!("Entity{}", i)).collect();

    store.upsert_role(Role::new("r1", "Auditor")).await;
    for name in &type_names {
        let entity = EntityTypeDescriptor::new(name.clone());
        store.upsert_entity_type(entity.clone()).await;
        store
            .upsert_association(EntityRoleAssociation::new(
                "r1",
                entity.id,
                payload::encode(&new).unwrap(),
            ))
            .await;
        service.set_filter_group("Auditor", name, old.clone()).await.unwrap();
    }

    let rebuild = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.build_caches().await })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        let type_names = type_names.clone();
        let (old, new) = (old.clone(), new.clone());
        readers.push(tokio::spawn(async move {
            for _ in 0..10 {
                for name in &type_names {
                    let seen = service.get_filter_group("Auditor", name).await.unwrap();
                    assert!(
                        seen.as_ref() == Some(&old) || seen.as_ref() == Some(&new),
                        "unexpected value for {}: {:?}",
                        name,
                        seen
                    );
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    for reader in readers {
        reader.await.unwrap();
    }
    let report = rebuild.await.unwrap().unwrap();
    assert_eq!(report.cached, type_names.len());

    for name in &type_names {
        assert_eq!(service.get_filter_group("Auditor", name).await.unwrap(), Some(new.clone()));
    }
}
