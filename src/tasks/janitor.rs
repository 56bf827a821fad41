//! Janitor Task
//!
//! Background task that periodically runs one eviction strategy against the
//! store to keep memory use or item count bounded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::lru::{evict_lru, heap_eviction_count, number_eviction_count};
use crate::cache::Store;
use crate::config::{
    CleanupConfig, CleanupMechanism, DEFAULT_CLEANUP_CLOCK, DEFAULT_CLEANUP_PERCENT,
    MIN_CLEANUP_CLOCK,
};
use crate::error::ConfigError;
use crate::tasks::memory::{MemoryProbe, ProcessMemory};

/// Caller-supplied cleanup routine for the `customFunc` mechanism.
pub type CleanupFn<V> = Arc<dyn Fn(&Store<V>) + Send + Sync>;

// == Cleanup Strategy ==
/// Eviction strategy run once per janitor tick.
pub enum CleanupStrategy<V> {
    /// Nothing to do
    None,
    /// Delegates to a caller-supplied function
    CustomFunc(CleanupFn<V>),
    /// Evicts `percent`% of LRU items while memory stays above `heap_target`
    HeapBasedLru {
        heap_target: u64,
        percent: f64,
        probe: Arc<dyn MemoryProbe>,
    },
    /// Evicts LRU items down to `target`
    NumberBasedLru { target: usize },
}

impl<V> fmt::Debug for CleanupStrategy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::CustomFunc(_) => f.write_str("CustomFunc"),
            Self::HeapBasedLru {
                heap_target,
                percent,
                ..
            } => f
                .debug_struct("HeapBasedLru")
                .field("heap_target", heap_target)
                .field("percent", percent)
                .finish(),
            Self::NumberBasedLru { target } => f
                .debug_struct("NumberBasedLru")
                .field("target", target)
                .finish(),
        }
    }
}

impl<V> CleanupStrategy<V> {
    // == Run ==
    /// Runs one cleanup pass and returns how many items it evicted.
    ///
    /// Custom functions report 0; whatever they delete is their own business.
    pub fn run(&self, store: &Store<V>) -> usize {
        match self {
            Self::None => 0,
            Self::CustomFunc(cleanup) => {
                cleanup(store);
                0
            }
            Self::HeapBasedLru {
                heap_target,
                percent,
                probe,
            } => heap_based_lru(store, *heap_target, *percent, probe.as_ref()),
            Self::NumberBasedLru { target } => number_based_lru(store, *target),
        }
    }
}

fn heap_based_lru<V>(store: &Store<V>, heap_target: u64, percent: f64, probe: &dyn MemoryProbe) -> usize {
    if probe.used_bytes() <= heap_target {
        return 0;
    }
    store.reclaim();
    let used = probe.used_bytes();
    if used <= heap_target {
        return 0;
    }

    debug!(used, heap_target, "heap-based cleanup triggered");
    let evicted = evict_lru(store, |n| {
        let k = heap_eviction_count(n, percent);
        if k == 0 {
            debug!(percent, items = n, "percent of items rounds down to nothing");
        }
        k
    });
    if evicted.removed > 0 {
        store.reclaim();
        debug!(used = probe.used_bytes(), "memory after heap-based cleanup");
    }
    evicted.removed
}

fn number_based_lru<V>(store: &Store<V>, target: usize) -> usize {
    let n = store.len();
    if n <= target {
        return 0;
    }

    debug!(items = n, target, "number-based cleanup triggered");
    let evicted = evict_lru(store, |n| number_eviction_count(n, target));
    if evicted.removed > 0 {
        store.reclaim();
    }
    evicted.removed
}

// == Janitor ==
/// A validated strategy together with its clock.
#[derive(Debug)]
pub struct Janitor<V> {
    strategy: CleanupStrategy<V>,
    clock: Duration,
}

impl<V> Janitor<V> {
    /// Validates `config` and builds the matching strategy.
    ///
    /// # Arguments
    /// * `config` - Janitor configuration
    /// * `custom` - Cleanup function, required for `customFunc`
    /// * `probe` - Memory source for `heapBasedLRU`, defaults to the process RSS
    pub fn from_config(
        config: &CleanupConfig,
        custom: Option<CleanupFn<V>>,
        probe: Option<Arc<dyn MemoryProbe>>,
    ) -> Result<Self, ConfigError> {
        let clock = if config.clock.is_zero() {
            DEFAULT_CLEANUP_CLOCK
        } else {
            config.clock
        };
        if config.mechanism != CleanupMechanism::None && clock < MIN_CLEANUP_CLOCK {
            return Err(ConfigError::ClockTooSmall {
                min_secs: MIN_CLEANUP_CLOCK.as_secs(),
                got_ms: clock.as_millis(),
            });
        }
        // Bounds the period the interval adds to `Instant`s
        if config.mechanism != CleanupMechanism::None {
            TimeDelta::from_std(clock)
                .map_err(|e| ConfigError::DurationOutOfRange(e.to_string()))?;
        }

        let strategy = match config.mechanism {
            CleanupMechanism::None => CleanupStrategy::None,
            CleanupMechanism::CustomFunc => {
                CleanupStrategy::CustomFunc(custom.ok_or(ConfigError::MissingCustomFunc)?)
            }
            CleanupMechanism::HeapBasedLru => {
                if config.heap_target == 0 {
                    return Err(ConfigError::MissingHeapTarget);
                }
                let percent = if config.percent == 0.0 {
                    DEFAULT_CLEANUP_PERCENT
                } else {
                    config.percent
                };
                if !(0.0..=100.0).contains(&percent) {
                    return Err(ConfigError::PercentOutOfRange(percent));
                }
                CleanupStrategy::HeapBasedLru {
                    heap_target: config.heap_target,
                    percent,
                    probe: probe.unwrap_or_else(|| Arc::new(ProcessMemory::new())),
                }
            }
            CleanupMechanism::NumberBasedLru => {
                if config.number_of_items_target == 0 {
                    return Err(ConfigError::MissingNumberTarget);
                }
                CleanupStrategy::NumberBasedLru {
                    target: usize::try_from(config.number_of_items_target).unwrap_or(usize::MAX),
                }
            }
        };

        Ok(Self { strategy, clock })
    }

    pub fn strategy(&self) -> &CleanupStrategy<V> {
        &self.strategy
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// Runs a single cleanup pass immediately.
    pub fn run_once(&self, store: &Store<V>) -> usize {
        self.strategy.run(store)
    }
}

impl<V: Send + Sync + 'static> Janitor<V> {
    // == Spawn ==
    /// Spawns the janitor loop on `runtime`.
    ///
    /// Returns `None` for the `None` strategy, which needs no task. The loop
    /// waits one clock before its first pass and stops once `shutdown` flips
    /// to `true` or its sender is dropped.
    pub fn spawn(
        self,
        runtime: &Handle,
        store: Arc<Store<V>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if matches!(self.strategy, CleanupStrategy::None) {
            return None;
        }

        Some(runtime.spawn(async move {
            info!(
                strategy = ?self.strategy,
                clock_secs = self.clock.as_secs(),
                "janitor started"
            );

            let mut ticker = tokio::time::interval(self.clock);
            // Skip the first immediate tick - we want to wait for the interval first
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.run_once(&store);
                        if evicted > 0 {
                            info!(evicted, remaining = store.len(), "janitor pass evicted items");
                        } else {
                            debug!("janitor pass: nothing to evict");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
            }

            info!("janitor stopped");
        }))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Item;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn filled_store(n: i64) -> Store<i64> {
        let store = Store::new();
        let base = Utc::now();
        for i in 0..n {
            let item = Item::new(i, base, None);
            item.touch(base + ChronoDuration::seconds(i));
            store.insert(format!("k{}", i), item);
        }
        store
    }

    fn config(mechanism: CleanupMechanism) -> CleanupConfig {
        CleanupConfig {
            mechanism,
            ..CleanupConfig::default()
        }
    }

    fn fixed_probe(bytes: u64) -> Option<Arc<dyn MemoryProbe>> {
        Some(Arc::new(move || bytes))
    }

    #[test]
    fn test_custom_func_required() {
        let result = Janitor::<i64>::from_config(&config(CleanupMechanism::CustomFunc), None, None);
        assert_eq!(result.unwrap_err(), ConfigError::MissingCustomFunc);
    }

    #[test]
    fn test_clock_floor_for_enabled_mechanism() {
        let mut cfg = config(CleanupMechanism::NumberBasedLru);
        cfg.number_of_items_target = 10;
        cfg.clock = Duration::from_secs(4);

        let result = Janitor::<i64>::from_config(&cfg, None, None);
        assert!(matches!(result, Err(ConfigError::ClockTooSmall { .. })));
    }

    #[test]
    fn test_clock_floor_ignored_for_none() {
        let mut cfg = config(CleanupMechanism::None);
        cfg.clock = Duration::from_secs(1);

        assert!(Janitor::<i64>::from_config(&cfg, None, None).is_ok());
    }

    #[test]
    fn test_zero_clock_uses_default() {
        let mut cfg = config(CleanupMechanism::NumberBasedLru);
        cfg.number_of_items_target = 10;
        cfg.clock = Duration::ZERO;

        let janitor = Janitor::<i64>::from_config(&cfg, None, None).unwrap();
        assert_eq!(janitor.clock(), DEFAULT_CLEANUP_CLOCK);
    }

    #[test]
    fn test_huge_clock_rejected() {
        let mut cfg = config(CleanupMechanism::NumberBasedLru);
        cfg.number_of_items_target = 10;
        cfg.clock = Duration::from_secs(u64::MAX);

        let result = Janitor::<i64>::from_config(&cfg, None, None);
        assert!(matches!(result, Err(ConfigError::DurationOutOfRange(_))));
    }

    #[test]
    fn test_heap_target_required() {
        let result = Janitor::<i64>::from_config(&config(CleanupMechanism::HeapBasedLru), None, None);
        assert_eq!(result.unwrap_err(), ConfigError::MissingHeapTarget);
    }

    #[test]
    fn test_percent_validation_and_default() {
        let mut cfg = config(CleanupMechanism::HeapBasedLru);
        cfg.heap_target = 1;

        cfg.percent = 150.0;
        assert_eq!(
            Janitor::<i64>::from_config(&cfg, None, None).unwrap_err(),
            ConfigError::PercentOutOfRange(150.0)
        );

        cfg.percent = -1.0;
        assert!(Janitor::<i64>::from_config(&cfg, None, None).is_err());

        cfg.percent = 0.0;
        let janitor = Janitor::<i64>::from_config(&cfg, None, fixed_probe(0)).unwrap();
        assert!(matches!(
            janitor.strategy(),
            CleanupStrategy::HeapBasedLru { percent, .. } if *percent == DEFAULT_CLEANUP_PERCENT
        ));
    }

    #[test]
    fn test_number_target_required() {
        let result = Janitor::<i64>::from_config(&config(CleanupMechanism::NumberBasedLru), None, None);
        assert_eq!(result.unwrap_err(), ConfigError::MissingNumberTarget);
    }

    #[test]
    fn test_number_based_evicts_down_to_target() {
        let store = filled_store(5);
        let mut cfg = config(CleanupMechanism::NumberBasedLru);
        cfg.number_of_items_target = 3;
        let janitor = Janitor::from_config(&cfg, None, None).unwrap();

        assert_eq!(janitor.run_once(&store), 2);

        assert_eq!(store.len(), 3);
        assert!(!store.contains_key("k0"));
        assert!(!store.contains_key("k1"));
        for key in ["k2", "k3", "k4"] {
            assert!(store.contains_key(key));
        }
    }

    #[test]
    fn test_number_based_under_target_is_noop() {
        let store = filled_store(3);
        let mut cfg = config(CleanupMechanism::NumberBasedLru);
        cfg.number_of_items_target = 3;
        let janitor = Janitor::from_config(&cfg, None, None).unwrap();

        assert_eq!(janitor.run_once(&store), 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_heap_based_evicts_percent_when_over_target() {
        let store = filled_store(10);
        let mut cfg = config(CleanupMechanism::HeapBasedLru);
        cfg.heap_target = 1024;
        cfg.percent = 20.0;
        let janitor = Janitor::from_config(&cfg, None, fixed_probe(u64::MAX)).unwrap();

        let evicted = janitor.run_once(&store);

        assert_eq!(evicted, 2);
        assert_eq!(store.len(), 8);
        assert!(!store.contains_key("k0"));
        assert!(!store.contains_key("k1"));
    }

    #[test]
    fn test_heap_based_never_evicts_everything() {
        let store = filled_store(4);
        let mut cfg = config(CleanupMechanism::HeapBasedLru);
        cfg.heap_target = 1024;
        cfg.percent = 100.0;
        let janitor = Janitor::from_config(&cfg, None, fixed_probe(u64::MAX)).unwrap();

        janitor.run_once(&store);
        janitor.run_once(&store);
        janitor.run_once(&store);

        assert_eq!(store.len(), 1);
        assert!(store.contains_key("k3"));
    }

    #[test]
    fn test_heap_based_under_target_is_noop() {
        let store = filled_store(10);
        let mut cfg = config(CleanupMechanism::HeapBasedLru);
        cfg.heap_target = 1024;
        let janitor = Janitor::from_config(&cfg, None, fixed_probe(10)).unwrap();

        assert_eq!(janitor.run_once(&store), 0);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_heap_based_recheck_after_reclaim() {
        let store = filled_store(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let probe_calls = Arc::clone(&calls);
        // Over target on the first read only
        let probe: Arc<dyn MemoryProbe> = Arc::new(move || {
            if probe_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                2048
            } else {
                512
            }
        });
        let mut cfg = config(CleanupMechanism::HeapBasedLru);
        cfg.heap_target = 1024;
        cfg.percent = 50.0;
        let janitor = Janitor::from_config(&cfg, None, Some(probe)).unwrap();

        assert_eq!(janitor.run_once(&store), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_custom_func_is_called() {
        let store = filled_store(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let custom: CleanupFn<i64> = Arc::new(move |store: &Store<i64>| {
            counter.fetch_add(1, Ordering::SeqCst);
            store.del("k0");
        });
        let janitor =
            Janitor::from_config(&config(CleanupMechanism::CustomFunc), Some(custom), None).unwrap();

        janitor.run_once(&store);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!store.contains_key("k0"));
    }

    #[tokio::test]
    async fn test_none_strategy_spawns_nothing() {
        let janitor = Janitor::<i64>::from_config(&CleanupConfig::default(), None, None).unwrap();
        let (_tx, rx) = watch::channel(false);

        assert!(janitor
            .spawn(&Handle::current(), Arc::new(Store::new()), rx)
            .is_none());
    }

    #[tokio::test]
    async fn test_janitor_stops_on_shutdown() {
        let mut cfg = config(CleanupMechanism::NumberBasedLru);
        cfg.number_of_items_target = 1;
        let janitor = Janitor::<i64>::from_config(&cfg, None, None).unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = janitor
            .spawn(&Handle::current(), Arc::new(Store::new()), rx)
            .unwrap();
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("janitor should stop promptly")
            .unwrap();
    }
}
