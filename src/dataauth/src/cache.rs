//! Rule cache backends
//!
//! The cache is a key-value service addressed by string keys. Every `set`,
//! `get` and `remove` is atomic per key; no multi-key transaction exists.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::DataAuthConfig;
use crate::error::{DataAuthError, Result};
use crate::filter::FilterGroup;

/// Key-value cache holding materialized filter groups
#[async_trait]
pub trait RuleCache: Send + Sync {
    /// Store a group under `key`, replacing any previous value
    async fn set(&self, key: &str, group: FilterGroup) -> Result<()>;

    /// Fetch the group under `key`; `Ok(None)` is a miss
    async fn get(&self, key: &str) -> Result<Option<FilterGroup>>;

    /// Remove `key`; returns whether an entry was present
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Enumerate keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let _ = prefix;
        Err(DataAuthError::CacheUnavailable(
            "key enumeration not supported by this cache backend".to_string(),
        ))
    }
}

/// In-memory rule cache
///
/// Values are held behind `Arc` and replaced whole, so a concurrent reader
/// observes either the previous or the new group.
pub struct MemoryRuleCache {
    entries: Arc<DashMap<String, Arc<FilterGroup>>>,
    available: AtomicBool,
    hits: AtomicUsize,
    misses: AtomicUsize,
    writes: AtomicUsize,
    removals: AtomicUsize,
}

impl MemoryRuleCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty cache with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::with_capacity(capacity)),
            available: AtomicBool::new(true),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            removals: AtomicUsize::new(0),
        }
    }

    /// Create an empty cache pre-sized from `config.cache_capacity`
    pub fn from_config(config: &DataAuthConfig) -> Self {
        Self::with_capacity(config.cache_capacity)
    }

    /// Number of entries the cache can hold without reallocating
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Simulate the backend becoming unreachable or recovering
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DataAuthError::CacheUnavailable("in-memory cache is offline".to_string()))
        }
    }
}

impl Default for MemoryRuleCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleCache for MemoryRuleCache {
    async fn set(&self, key: &str, group: FilterGroup) -> Result<()> {
        self.check_available()?;
        self.entries.insert(key.to_string(), Arc::new(group));
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<FilterGroup>> {
        self.check_available()?;
        let value = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        match value {
            Some(group) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(FilterGroup::clone(&group)))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.removals.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub writes: usize,
    pub removals: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
