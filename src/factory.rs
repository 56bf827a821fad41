//! Engine Factory
//!
//! Builds a named engine from a generic configuration bag.

use chrono::TimeDelta;
use serde_json::Value;
use tracing::info;

use crate::config::EngineConfig;
use crate::contract::{Cache, NullCache};
use crate::engine::{Hooks, InMemoryCache};
use crate::error::{ConfigError, Result};

// == Engine ==
/// Any engine the factory can build.
pub enum Engine<V> {
    InMemory(InMemoryCache<V>),
    Null(NullCache),
}

impl<V: Clone> Cache<V> for Engine<V> {
    fn set(&self, key: &str, value: V, revisit: TimeDelta) -> Result<()> {
        match self {
            Self::InMemory(cache) => Cache::set(cache, key, value, revisit),
            Self::Null(cache) => Cache::<V>::set(cache, key, value, revisit),
        }
    }

    fn get(&self, key: &str) -> Result<V> {
        match self {
            Self::InMemory(cache) => Cache::get(cache, key),
            Self::Null(cache) => Cache::<V>::get(cache, key),
        }
    }

    fn del(&self, key: &str) -> Result<()> {
        match self {
            Self::InMemory(cache) => Cache::del(cache, key),
            Self::Null(cache) => Cache::<V>::del(cache, key),
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Self::InMemory(cache) => cache.close().await,
            Self::Null(cache) => Cache::<V>::close(cache).await,
        }
    }
}

// == Build Cache ==
/// Builds the engine called `name`.
///
/// # Arguments
/// * `name` - `inmemory` (alias `memory`) or `null` (alias `dummy`), case-insensitive
/// * `settings` - Engine configuration; `null` means all defaults
/// * `hooks` - Callbacks for the in-memory engine, ignored by the null engine
///
/// # Errors
/// `UnknownEngine` for an unrecognized name, `Invalid` when `settings`
/// doesn't match the engine's configuration, plus whatever the engine's
/// own validation rejects.
pub fn build_cache<V>(name: &str, settings: &Value, hooks: Hooks<V>) -> Result<Engine<V>>
where
    V: Send + Sync + 'static,
{
    match name.to_ascii_lowercase().as_str() {
        "inmemory" | "memory" => {
            let config = if settings.is_null() {
                EngineConfig::default()
            } else {
                serde_json::from_value(settings.clone())
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?
            };
            let cache = InMemoryCache::builder(config).hooks(hooks).build()?;
            Ok(Engine::InMemory(cache))
        }
        "null" | "dummy" => {
            info!("null cache engine selected");
            Ok(Engine::Null(NullCache))
        }
        other => Err(ConfigError::UnknownEngine(other.to_string()).into()),
    }
}
