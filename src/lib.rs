//! Revisit Cache - an in-process caching engine
//!
//! A key → value store with optional per-item scheduled revisits (for
//! expiration or refresh) and a background janitor that keeps memory use or
//! item count within budget.

pub mod cache;
pub mod config;
pub mod contract;
pub mod engine;
pub mod error;
pub mod factory;
pub mod tasks;

pub use cache::{Item, StatsSnapshot, Store};
pub use config::{CleanupConfig, CleanupMechanism, EngineConfig};
pub use contract::{Cache, NullCache};
pub use engine::{Hooks, InMemoryCache, InMemoryCacheBuilder, USE_DEFAULT};
pub use error::{CacheError, ConfigError, Result};
pub use factory::{build_cache, Engine};
pub use tasks::{expire, CleanupFn, MemoryProbe, ProcessMemory, RevisitFn};
