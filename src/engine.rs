//! In-Memory Engine
//!
//! Wires the store, the revisit scheduler and the janitor together behind
//! `set`/`get`/`del`/`close`, and owns their lifecycle.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Item, StatsSnapshot, Store};
use crate::config::{EngineConfig, MIN_REVISIT_DURATION};
use crate::error::{CacheError, ConfigError, Result};
use crate::tasks::{CleanupFn, Janitor, MemoryProbe, RevisitFn, Scheduler, Ticket};

/// Revisit duration that asks `set` to use the configured default.
pub const USE_DEFAULT: TimeDelta = TimeDelta::zero();

// == Hooks ==
/// Code handed to the engine alongside its configuration.
pub struct Hooks<V> {
    /// Called for every live revisit ticket, required when workers > 0
    pub revisit: Option<RevisitFn<V>>,
    /// Cleanup routine for the `customFunc` mechanism
    pub cleanup: Option<CleanupFn<V>>,
    /// Memory source for `heapBasedLRU`, defaults to the process RSS
    pub memory_probe: Option<Arc<dyn MemoryProbe>>,
}

impl<V> Default for Hooks<V> {
    fn default() -> Self {
        Self {
            revisit: None,
            cleanup: None,
            memory_probe: None,
        }
    }
}

// == Builder ==
/// Builder for [`InMemoryCache`].
pub struct InMemoryCacheBuilder<V> {
    config: EngineConfig,
    hooks: Hooks<V>,
}

impl<V: Send + Sync + 'static> InMemoryCacheBuilder<V> {
    /// Sets the revisit callback, e.g. [`crate::expire`].
    pub fn revisit_func<F>(mut self, revisit: F) -> Self
    where
        F: Fn(&Store<V>, &str, &Item<V>) + Send + Sync + 'static,
    {
        self.hooks.revisit = Some(Arc::new(revisit));
        self
    }

    /// Sets the cleanup routine used by the `customFunc` mechanism.
    pub fn cleanup_func<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&Store<V>) + Send + Sync + 'static,
    {
        self.hooks.cleanup = Some(Arc::new(cleanup));
        self
    }

    /// Replaces the memory source used by `heapBasedLRU`.
    pub fn memory_probe<P: MemoryProbe + 'static>(mut self, probe: P) -> Self {
        self.hooks.memory_probe = Some(Arc::new(probe));
        self
    }

    pub fn hooks(mut self, hooks: Hooks<V>) -> Self {
        self.hooks = hooks;
        self
    }

    // == Build ==
    /// Validates the configuration and starts the background tasks.
    ///
    /// A Tokio runtime is needed only when revisits or cleanup are enabled.
    pub fn build(self) -> Result<InMemoryCache<V>> {
        let Self { config, hooks } = self;

        let default_revisit = TimeDelta::from_std(config.default_revisit_duration)
            .map_err(|e| ConfigError::DurationOutOfRange(e.to_string()))?;
        if !config.default_revisit_duration.is_zero()
            && config.default_revisit_duration < MIN_REVISIT_DURATION
        {
            return Err(ConfigError::SmallDefaultDuration.into());
        }

        let workers = config.revisit_number_of_workers;
        let revisit = match (workers, hooks.revisit) {
            (0, _) => None,
            (_, Some(revisit)) => Some(revisit),
            (_, None) => return Err(ConfigError::MissingRevisitFunc.into()),
        };
        let janitor = Janitor::from_config(&config.cleanup, hooks.cleanup, hooks.memory_probe)?;

        let store = Arc::new(Store::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        let mut scheduler = None;

        let needs_runtime =
            revisit.is_some() || !matches!(janitor.strategy(), crate::tasks::CleanupStrategy::None);
        if needs_runtime {
            let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

            if let Some(revisit) = revisit {
                let (handle, handles) = Scheduler::spawn(
                    &runtime,
                    Arc::clone(&store),
                    config.revisit_clock,
                    workers,
                    revisit,
                    shutdown_rx.clone(),
                )?;
                scheduler = Some(handle);
                tasks.extend(handles);
            }
            tasks.extend(janitor.spawn(&runtime, Arc::clone(&store), shutdown_rx));
        }

        info!(
            workers,
            cleanup = ?config.cleanup.mechanism,
            default_revisit_secs = config.default_revisit_duration.as_secs(),
            "in-memory cache engine started"
        );

        Ok(InMemoryCache {
            store,
            scheduler,
            default_revisit,
            shutdown,
            tasks: Mutex::new(tasks),
        })
    }
}

// == In-Memory Cache ==
/// In-process cache engine with scheduled revisits and janitor eviction.
///
/// # Example
///
/// ```rust,no_run
/// use chrono::TimeDelta;
/// use revisit_cache::{expire, EngineConfig, InMemoryCache};
///
/// #[tokio::main]
/// async fn main() -> revisit_cache::Result<()> {
///     let config = EngineConfig {
///         revisit_number_of_workers: 2,
///         ..EngineConfig::default()
///     };
///     let cache = InMemoryCache::<String>::builder(config)
///         .revisit_func(expire)
///         .build()?;
///
///     cache.set("session", "token".to_string(), TimeDelta::minutes(5))?;
///     assert_eq!(cache.get("session")?, "token");
///
///     cache.close().await
/// }
/// ```
pub struct InMemoryCache<V> {
    store: Arc<Store<V>>,
    scheduler: Option<Scheduler>,
    default_revisit: TimeDelta,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<V: Send + Sync + 'static> InMemoryCache<V> {
    pub fn builder(config: EngineConfig) -> InMemoryCacheBuilder<V> {
        InMemoryCacheBuilder {
            config,
            hooks: Hooks::default(),
        }
    }
}

impl<V> InMemoryCache<V> {
    // == Set ==
    /// Stores `value` under `key`, replacing any existing item entirely.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `revisit` - Delay before the revisit callback runs; [`USE_DEFAULT`]
    ///   substitutes the configured default
    ///
    /// # Errors
    /// - `NegativeDuration` if `revisit` is negative
    /// - `SmallDuration` if `revisit` is positive but under 5 seconds
    ///
    /// Nothing is stored when an error is returned.
    pub fn set(&self, key: impl Into<String>, value: V, revisit: TimeDelta) -> Result<()> {
        if revisit < TimeDelta::zero() {
            return Err(CacheError::NegativeDuration);
        }
        let revisit = if revisit.is_zero() {
            self.default_revisit
        } else {
            revisit
        };
        let min_millis = MIN_REVISIT_DURATION.as_millis() as i64;
        if revisit > TimeDelta::zero() && revisit.num_milliseconds() < min_millis {
            return Err(CacheError::SmallDuration);
        }

        let key = key.into();
        let now = Utc::now();
        // A due time past the representable range is never reached, and a
        // closed engine has no dispatch loop left to drain new tickets
        let due = match &self.scheduler {
            Some(_) if revisit > TimeDelta::zero() && !self.is_closed() => {
                now.checked_add_signed(revisit)
            }
            _ => None,
        };

        self.store.insert(key.clone(), Item::new(value, now, due));
        if let (Some(scheduler), Some(due)) = (&self.scheduler, due) {
            scheduler.schedule(Ticket::new(key, due));
        }
        Ok(())
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key is not an error.
    pub fn del(&self, key: &str) -> Result<()> {
        self.store.del(key);
        Ok(())
    }

    // == Close ==
    /// Stops the scheduler and the janitor and waits for all their tasks.
    ///
    /// Concurrent callers all wait for the same join, and a later call
    /// returns once nothing is left to join. The store stays readable
    /// afterwards, but no revisit or cleanup runs anymore.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.send_replace(true);

        let mut tasks = self.tasks.lock().await;
        if tasks.is_empty() {
            return Ok(());
        }
        // Handles leave the list only once joined, so a cancelled close
        // leaves the rest for the next caller
        while let Some(task) = tasks.last_mut() {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
            tasks.pop();
        }

        info!("in-memory cache engine closed");
        Ok(())
    }

    /// Whether `close` has been called (or the engine is being dropped).
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Returns the item stored under `key` without recording an access.
    pub fn item(&self, key: &str) -> Option<Arc<Item<V>>> {
        self.store.item(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Tickets waiting in the scheduler, stale ones included.
    pub fn pending_revisits(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::pending)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.store.stats()
    }
}

impl<V: Clone> InMemoryCache<V> {
    // == Get ==
    /// Returns a copy of the value stored under `key`, or `Miss`.
    pub fn get(&self, key: &str) -> Result<V> {
        self.store.get(key)
    }
}

impl<V> Drop for InMemoryCache<V> {
    fn drop(&mut self) {
        // Tasks notice at their next wake-up; only `close` waits for them
        if !self.is_closed() {
            debug!("in-memory cache engine dropped without close");
            self.shutdown.send_replace(true);
        }
    }
}
