//! Cache Contract
//!
//! The four-method interface every engine implements, and the null engine.

use chrono::TimeDelta;

use crate::engine::InMemoryCache;
use crate::error::{CacheError, Result};

// == Cache Trait ==
/// Common interface of all cache engines.
#[allow(async_fn_in_trait)]
pub trait Cache<V> {
    /// Stores `value` under `key`. If `revisit` is positive, the engine
    /// revisits the key after that delay unless it is reset or deleted first.
    fn set(&self, key: &str, value: V, revisit: TimeDelta) -> Result<()>;

    /// Returns the value for `key` if it is still cached.
    fn get(&self, key: &str) -> Result<V>;

    /// Deletes `key`.
    fn del(&self, key: &str) -> Result<()>;

    /// Frees the engine's resources.
    async fn close(&self) -> Result<()>;
}

impl<V: Clone> Cache<V> for InMemoryCache<V> {
    fn set(&self, key: &str, value: V, revisit: TimeDelta) -> Result<()> {
        InMemoryCache::set(self, key, value, revisit)
    }

    fn get(&self, key: &str) -> Result<V> {
        InMemoryCache::get(self, key)
    }

    fn del(&self, key: &str) -> Result<()> {
        InMemoryCache::del(self, key)
    }

    async fn close(&self) -> Result<()> {
        InMemoryCache::close(self).await
    }
}

// == Null Cache ==
/// Engine that stores nothing and always misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl<V> Cache<V> for NullCache {
    fn set(&self, _key: &str, _value: V, _revisit: TimeDelta) -> Result<()> {
        Ok(())
    }

    fn get(&self, _key: &str) -> Result<V> {
        Err(CacheError::Miss)
    }

    fn del(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[tokio::test]
    async fn test_null_cache_always_misses() {
        let cache = NullCache;

        Cache::<i32>::set(&cache, "t1", 1, TimeDelta::minutes(1)).unwrap();
        assert!(matches!(
            Cache::<i32>::get(&cache, "t1"),
            Err(CacheError::Miss)
        ));
        Cache::<i32>::del(&cache, "t1").unwrap();
        Cache::<i32>::del(&cache, "t2").unwrap();
        Cache::<i32>::close(&cache).await.unwrap();
    }

    async fn roundtrip<C: Cache<i32>>(cache: &C) -> Result<i32> {
        cache.set("t1", 7, TimeDelta::minutes(1))?;
        let value = cache.get("t1")?;
        cache.del("t1")?;
        cache.close().await?;
        Ok(value)
    }

    #[tokio::test]
    async fn test_in_memory_cache_through_trait() {
        let cache = InMemoryCache::<i32>::builder(EngineConfig::default())
            .build()
            .unwrap();

        assert_eq!(roundtrip(&cache).await.unwrap(), 7);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_null_cache_through_trait() {
        assert!(matches!(roundtrip(&NullCache).await, Err(CacheError::Miss)));
    }
}
