//! Memory cache implementation using cached::TimedSizedCache.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use cached::{Cached, TimedSizedCache};
use serde_json::Value;

use crate::cache::{AppCache, CacheError, MemoryCacheConfig};

/// In-memory cache with size limit and TTL.
pub struct MemoryCache {
    store: Mutex<TimedSizedCache<String, Value>>,
}

impl MemoryCache {
    pub fn new(config: &MemoryCacheConfig) -> Result<Self, CacheError> {
        if config.max_size == 0 {
            return Err(CacheError::Configuration(
                "memory cache max_size must be greater than 0".to_string(),
            ));
        }
        let store = TimedSizedCache::with_size_and_lifespan(
            config.max_size,
            Duration::from_secs(config.ttl_seconds),
        );
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, TimedSizedCache<String, Value>>, CacheError> {
        self.store
            .lock()
            .map_err(|e| CacheError::Operation(e.to_string()))
    }
}

#[async_trait]
impl AppCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.lock()?.cache_get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CacheError> {
        self.lock()?.cache_set(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.cache_remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.lock()?.cache_clear();
        Ok(())
    }
}
