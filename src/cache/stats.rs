//! Cache Statistics Module
//!
//! Best-effort counters for hits, misses, evictions and revisit dispatch.
//! Counters use relaxed atomics; they are never used for control decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Live counters shared by the engine and its background tasks.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    revisits: AtomicU64,
    stale_tickets: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of lookups of absent keys
    pub misses: u64,
    /// Number of items removed by the janitor
    pub evictions: u64,
    /// Number of revisit callbacks invoked
    pub revisits: u64,
    /// Number of dispatched tickets dropped by the staleness check
    pub stale_tickets: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_revisit(&self) {
        self.revisits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_ticket(&self) {
        self.stale_tickets.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the counters; `total_entries` is supplied by the caller.
    pub fn snapshot(&self, total_entries: usize) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            revisits: self.revisits.load(Ordering::Relaxed),
            stale_tickets: self.stale_tickets.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

impl StatsSnapshot {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let snapshot = CacheStats::new().snapshot(0);
        assert_eq!(snapshot, StatsSnapshot::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().snapshot(0).hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.snapshot(0).hit_rate(), 0.5);
    }

    #[test]
    fn test_record_evictions_and_revisits() {
        let stats = CacheStats::new();
        stats.record_evictions(3);
        stats.record_evictions(2);
        stats.record_revisit();
        stats.record_stale_ticket();

        let snapshot = stats.snapshot(7);
        assert_eq!(snapshot.evictions, 5);
        assert_eq!(snapshot.revisits, 1);
        assert_eq!(snapshot.stale_tickets, 1);
        assert_eq!(snapshot.total_entries, 7);
    }

    #[test]
    fn test_snapshot_serialize() {
        let stats = CacheStats::new();
        stats.record_hit();
        let json = serde_json::to_string(&stats.snapshot(1)).unwrap();
        assert!(json.contains("\"hits\":1"));
        assert!(json.contains("\"total_entries\":1"));
    }
}
