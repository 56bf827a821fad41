//! Cache Item Module
//!
//! Defines a stored value together with its access metadata and scheduled
//! revisit time.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

// == Item ==
/// A single cache entry.
///
/// `last_access` and `hits` are updated after the map lock is released, with
/// relaxed atomics. They are race-free but approximate: concurrent readers may
/// overwrite each other's access time, so it is not guaranteed to increase.
#[derive(Debug)]
pub struct Item<V> {
    value: V,
    created_at: DateTime<Utc>,
    /// Unix milliseconds
    last_access: AtomicI64,
    hits: AtomicU64,
    revisit_time: Option<DateTime<Utc>>,
}

impl<V> Item<V> {
    // == Constructor ==
    /// Creates a fresh item; `hits` starts at zero and `last_access` at `now`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `now` - Creation time
    /// * `revisit_time` - Absolute due time of the scheduled revisit, if any
    pub fn new(value: V, now: DateTime<Utc>, revisit_time: Option<DateTime<Utc>>) -> Self {
        Self {
            value,
            created_at: now,
            last_access: AtomicI64::new(now.timestamp_millis()),
            hits: AtomicU64::new(0),
            revisit_time,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last time the item was read (or created), millisecond precision.
    pub fn last_access(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_access_ms()).unwrap_or(self.created_at)
    }

    pub fn last_access_ms(&self) -> i64 {
        self.last_access.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Due time of the live revisit obligation, `None` if nothing is scheduled.
    pub fn revisit_time(&self) -> Option<DateTime<Utc>> {
        self.revisit_time
    }

    // == Touch ==
    /// Records a read at `now`.
    pub fn touch(&self, now: DateTime<Utc>) {
        self.last_access
            .store(now.timestamp_millis(), Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
}
