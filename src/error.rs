//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Revisit duration passed to `set` was negative
    #[error("revisit duration can't be negative")]
    NegativeDuration,

    /// Revisit duration was positive but below the scheduler's granularity
    #[error("revisit durations below 5 seconds aren't supported by this engine")]
    SmallDuration,

    /// Key is not cached, or has been deleted
    #[error("not cached, or deleted")]
    Miss,

    /// Engine configuration was rejected at construction time
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Background tasks could not be spawned
    #[error("engine requires a Tokio runtime to run its background tasks")]
    NoRuntime,
}

// == Config Error Enum ==
/// Configuration problems detected while building an engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("revisit workers are enabled but no revisit function is set")]
    MissingRevisitFunc,

    #[error("mechanism is customFunc but no custom function is set")]
    MissingCustomFunc,

    #[error("cleanup clock should be at least {min_secs} seconds, got {got_ms}ms")]
    ClockTooSmall { min_secs: u64, got_ms: u128 },

    #[error("no heap target is set")]
    MissingHeapTarget,

    #[error("percent should be between 0 and 100, got {0}")]
    PercentOutOfRange(f64),

    #[error("no number of items target is set")]
    MissingNumberTarget,

    #[error("default revisit duration must be zero or at least 5 seconds")]
    SmallDefaultDuration,

    #[error("duration is out of range: {0}")]
    DurationOutOfRange(String),

    #[error("unknown cache engine: {0}")]
    UnknownEngine(String),

    #[error("{0}")]
    Invalid(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
