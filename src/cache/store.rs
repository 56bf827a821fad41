//! Cache Store Module
//!
//! The protected key → item map shared by the engine facade, the revisit
//! workers and the janitor.
//!
//! Locking discipline: mutations take the write lock; lookups and janitor
//! snapshots take the read lock only around the map access. Access metadata
//! is updated after the lock is released. No lock is held while user code
//! runs, so callbacks may call back into the store freely.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::cache::{CacheStats, Item, StatsSnapshot};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Thread-safe item map.
///
/// Revisit and cleanup callbacks receive a `&Store` rather than the engine,
/// which limits them to item-level operations.
#[derive(Debug)]
pub struct Store<V> {
    items: RwLock<HashMap<String, Arc<Item<V>>>>,
    stats: CacheStats,
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Store<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            stats: CacheStats::new(),
        }
    }

    // == Insert ==
    /// Replaces any existing entry for `key` with `item`.
    pub(crate) fn insert(&self, key: String, item: Item<V>) {
        self.items.write().insert(key, Arc::new(item));
    }

    // == Item ==
    /// Returns the item stored under `key` without recording an access.
    pub fn item(&self, key: &str) -> Option<Arc<Item<V>>> {
        self.items.read().get(key).cloned()
    }

    // == Delete ==
    /// Removes `key` if present. Absent keys are not an error.
    pub fn del(&self, key: &str) {
        self.items.write().remove(key);
    }

    // == Remove Keys ==
    /// Removes every listed key under a single write lock.
    ///
    /// Returns how many of them were actually present.
    pub fn remove_keys<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut items = self.items.write();
        keys.into_iter()
            .filter(|key| items.remove(*key).is_some())
            .count()
    }

    // == Access Snapshot ==
    /// Copies `(last_access_ms, key)` for every item under the read lock.
    pub fn access_snapshot(&self) -> Vec<(i64, String)> {
        self.items
            .read()
            .iter()
            .map(|(key, item)| (item.last_access_ms(), key.clone()))
            .collect()
    }

    // == Reclaim ==
    /// Releases spare map capacity back to the allocator.
    pub fn reclaim(&self) {
        self.items.write().shrink_to_fit();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.read().contains_key(key)
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub(crate) fn counters(&self) -> &CacheStats {
        &self.stats
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.len())
    }
}

impl<V: Clone> Store<V> {
    // == Get ==
    /// Retrieves a copy of the value stored under `key`.
    ///
    /// On a hit the item's access time and hit count are updated after the
    /// read lock is dropped.
    pub fn get(&self, key: &str) -> Result<V> {
        let Some(item) = self.item(key) else {
            self.stats.record_miss();
            return Err(CacheError::Miss);
        };

        item.touch(Utc::now());
        self.stats.record_hit();
        Ok(item.value().clone())
    }
}
