//! LRU Selection Module
//!
//! Picks least-recently-used victims from a snapshot of the store.
//!
//! Selection works on a `(last_access, key)` snapshot taken under the read
//! lock; victims are then removed under the write lock. The two steps are not
//! atomic with respect to concurrent writers, so eviction is advisory.

use tracing::debug;

use crate::cache::Store;

// == Eviction Outcome ==
/// Result of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evicted {
    /// Items actually removed from the store
    pub removed: usize,
    /// Access time (Unix ms) of the most recently used victim
    pub newest_victim_ms: Option<i64>,
}

// == Least Recently Used ==
/// Returns the `k` pairs with the oldest access time, oldest first.
///
/// Ties on access time are broken by key so the result is deterministic.
/// If `k` exceeds the number of pairs, all pairs are returned.
pub fn least_recently_used(mut pairs: Vec<(i64, String)>, k: usize) -> Vec<(i64, String)> {
    pairs.sort_unstable();
    pairs.truncate(k);
    pairs
}

// == Heap Eviction Count ==
/// Number of items a heap-based trigger evicts out of `n`.
///
/// `floor(n * percent / 100)`, clamped so at least one item survives.
pub fn heap_eviction_count(n: usize, percent: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let k = (n as f64 * percent / 100.0).floor() as usize;
    k.min(n - 1)
}

// == Number Eviction Count ==
/// Number of items to evict to bring `n` back down to `target`.
pub fn number_eviction_count(n: usize, target: usize) -> usize {
    n.saturating_sub(target)
}

// == Evict LRU ==
/// Removes the least recently used items from `store`.
///
/// `count` maps the number of items in the snapshot to the number of
/// victims, so the decision is made against the same view the victims are
/// picked from.
pub fn evict_lru<V, F>(store: &Store<V>, count: F) -> Evicted
where
    F: FnOnce(usize) -> usize,
{
    let snapshot = store.access_snapshot();
    let k = count(snapshot.len());
    if k == 0 {
        return Evicted::default();
    }

    let victims = least_recently_used(snapshot, k);
    let newest_victim_ms = victims.last().map(|(last_access, _)| *last_access);
    let removed = store.remove_keys(victims.iter().map(|(_, key)| key.as_str()));
    store.counters().record_evictions(removed);

    debug!(
        requested = k,
        removed,
        newest_victim_ms = ?newest_victim_ms,
        "evicted least recently used items"
    );

    Evicted {
        removed,
        newest_victim_ms,
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Item;
    use chrono::{Duration, Utc};

    fn pairs(accesses: &[i64]) -> Vec<(i64, String)> {
        accesses.iter().map(|a| (*a, a.to_string())).collect()
    }

    #[test]
    fn test_lru_empty() {
        assert!(least_recently_used(Vec::new(), 2).is_empty());
    }

    #[test]
    fn test_lru_picks_oldest_in_order() {
        let input = pairs(&[1070, 1050, 1030, 1060, 1040, 1080, 1090, 1020, 1000, 1010]);

        let victims = least_recently_used(input, 2);

        assert_eq!(victims.len(), 2);
        assert_eq!(victims[0].0, 1000);
        assert_eq!(victims[1].0, 1010);
    }

    #[test]
    fn test_lru_k_larger_than_input() {
        let victims = least_recently_used(pairs(&[3, 1, 2]), 10);
        assert_eq!(victims, pairs(&[1, 2, 3]));
    }

    #[test]
    fn test_lru_ties_broken_by_key() {
        let input = vec![(5, "b".to_string()), (5, "a".to_string()), (9, "c".to_string())];

        let victims = least_recently_used(input, 1);

        assert_eq!(victims, vec![(5, "a".to_string())]);
    }

    #[test]
    fn test_heap_eviction_count_floors() {
        assert_eq!(heap_eviction_count(10, 20.0), 2);
        assert_eq!(heap_eviction_count(10, 25.0), 2);
        assert_eq!(heap_eviction_count(19, 5.0), 0);
        assert_eq!(heap_eviction_count(20, 5.0), 1);
    }

    #[test]
    fn test_heap_eviction_count_keeps_one_item() {
        assert_eq!(heap_eviction_count(10, 100.0), 9);
        assert_eq!(heap_eviction_count(1, 100.0), 0);
        assert_eq!(heap_eviction_count(0, 50.0), 0);
    }

    #[test]
    fn test_number_eviction_count() {
        assert_eq!(number_eviction_count(5, 3), 2);
        assert_eq!(number_eviction_count(3, 3), 0);
        assert_eq!(number_eviction_count(1, 3), 0);
    }

    #[test]
    fn test_evict_lru_removes_oldest() {
        let store = Store::new();
        let base = Utc::now();
        for i in 0..5 {
            let item = Item::new(i, base, None);
            item.touch(base + Duration::seconds(i));
            store.insert(format!("k{}", i), item);
        }

        let evicted = evict_lru(&store, |n| {
            assert_eq!(n, 5);
            2
        });

        assert_eq!(evicted.removed, 2);
        assert_eq!(
            evicted.newest_victim_ms,
            Some((base + Duration::seconds(1)).timestamp_millis())
        );
        assert!(!store.contains_key("k0"));
        assert!(!store.contains_key("k1"));
        assert_eq!(store.len(), 3);
        assert_eq!(store.stats().evictions, 2);
    }

    #[test]
    fn test_evict_lru_zero_is_noop() {
        let store = Store::new();
        store.insert("k".to_string(), Item::new(1, Utc::now(), None));

        assert_eq!(evict_lru(&store, |_| 0), Evicted::default());
        assert_eq!(store.len(), 1);
    }
}
