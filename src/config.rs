//! Configuration Module
//!
//! Plain-data engine configuration. Values come from `Default`, from
//! environment variables, or from a deserialized configuration bag.
//! Callbacks are not configuration data; they are handed to the engine
//! builder.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Limits and Defaults ==
/// Smallest positive revisit duration `set` accepts.
pub const MIN_REVISIT_DURATION: Duration = Duration::from_secs(5);
/// Floor applied to the scheduler clock.
pub const MIN_REVISIT_CLOCK: Duration = Duration::from_secs(1);
pub const DEFAULT_REVISIT_CLOCK: Duration = Duration::from_secs(30);
/// Smallest janitor clock accepted for an enabled mechanism.
pub const MIN_CLEANUP_CLOCK: Duration = Duration::from_secs(5);
pub const DEFAULT_CLEANUP_CLOCK: Duration = Duration::from_secs(60);
pub const DEFAULT_CLEANUP_PERCENT: f64 = 5.0;

// == Cleanup Mechanism ==
/// Janitor strategy tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupMechanism {
    /// No cleanup at all
    #[default]
    #[serde(rename = "none")]
    None,
    /// Delegates to a caller-supplied function
    #[serde(rename = "customFunc")]
    CustomFunc,
    /// Evicts a percentage of LRU items while process memory is above target
    #[serde(rename = "heapBasedLRU")]
    HeapBasedLru,
    /// Evicts LRU items until the item count is back at target
    #[serde(rename = "numberBasedLRU")]
    NumberBasedLru,
}

impl FromStr for CleanupMechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "customfunc" => Ok(Self::CustomFunc),
            "heapbasedlru" => Ok(Self::HeapBasedLru),
            "numberbasedlru" => Ok(Self::NumberBasedLru),
            other => Err(format!("unknown cleanup mechanism: {}", other)),
        }
    }
}

// == Cleanup Config ==
/// Janitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanupConfig {
    pub mechanism: CleanupMechanism,
    /// Interval between janitor runs; zero means the default
    #[serde(with = "duration_secs")]
    pub clock: Duration,
    /// Process memory threshold in bytes for `heapBasedLRU`
    pub heap_target: u64,
    /// Item count threshold for `numberBasedLRU`
    pub number_of_items_target: u64,
    /// Share of items evicted per `heapBasedLRU` trigger; zero means the default
    pub percent: f64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            mechanism: CleanupMechanism::None,
            clock: DEFAULT_CLEANUP_CLOCK,
            heap_target: 0,
            number_of_items_target: 0,
            percent: DEFAULT_CLEANUP_PERCENT,
        }
    }
}

// == Engine Config ==
/// In-memory engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Substituted when `set` is called with `USE_DEFAULT`
    #[serde(with = "duration_secs")]
    pub default_revisit_duration: Duration,
    /// Scheduler worker pool size, 0 disables revisits entirely
    pub revisit_number_of_workers: usize,
    /// Scheduler polling interval
    #[serde(with = "duration_secs")]
    pub revisit_clock: Duration,
    pub cleanup: CleanupConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_revisit_duration: Duration::ZERO,
            revisit_number_of_workers: 0,
            revisit_clock: DEFAULT_REVISIT_CLOCK,
            cleanup: CleanupConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new EngineConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_REVISIT_DURATION` - Default revisit duration in seconds (default: 0)
    /// - `REVISIT_WORKERS` - Scheduler worker count (default: 0)
    /// - `REVISIT_CLOCK` - Scheduler clock in seconds (default: 30)
    /// - `CLEANUP_MECHANISM` - none, customFunc, heapBasedLRU or numberBasedLRU (default: none)
    /// - `CLEANUP_CLOCK` - Janitor clock in seconds (default: 60)
    /// - `CLEANUP_HEAP_TARGET` - Memory target in bytes (default: 0)
    /// - `CLEANUP_NUMBER_TARGET` - Item count target (default: 0)
    /// - `CLEANUP_PERCENT` - Eviction percent for heapBasedLRU (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_revisit_duration: Duration::from_secs(env_or(
                "DEFAULT_REVISIT_DURATION",
                defaults.default_revisit_duration.as_secs(),
            )),
            revisit_number_of_workers: env_or(
                "REVISIT_WORKERS",
                defaults.revisit_number_of_workers,
            ),
            revisit_clock: Duration::from_secs(env_or(
                "REVISIT_CLOCK",
                defaults.revisit_clock.as_secs(),
            )),
            cleanup: CleanupConfig {
                mechanism: env_or("CLEANUP_MECHANISM", defaults.cleanup.mechanism),
                clock: Duration::from_secs(env_or(
                    "CLEANUP_CLOCK",
                    defaults.cleanup.clock.as_secs(),
                )),
                heap_target: env_or("CLEANUP_HEAP_TARGET", defaults.cleanup.heap_target),
                number_of_items_target: env_or(
                    "CLEANUP_NUMBER_TARGET",
                    defaults.cleanup.number_of_items_target,
                ),
                percent: env_or("CLEANUP_PERCENT", defaults.cleanup.percent),
            },
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Serializes durations as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
