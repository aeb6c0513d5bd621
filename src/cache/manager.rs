//! Cache manager that dispatches to the configured backend.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::cache::memory::MemoryCache;
use crate::cache::noop::NoOpCache;
use crate::cache::{AppCache, CacheBackend, CacheConfig, CacheError};

/// Cache owned by one service.
#[derive(Clone)]
pub struct CacheManager {
    name: String,
    backend: Arc<dyn AppCache>,
    config: CacheConfig,
}

impl CacheManager {
    /// Create a cache manager for the named service.
    ///
    /// If caching is disabled, a NoOpCache is used.
    pub fn new(config: CacheConfig, name: &str) -> Result<Self, CacheError> {
        let backend: Arc<dyn AppCache> = if !config.enabled {
            Arc::new(NoOpCache)
        } else {
            match config.backend {
                CacheBackend::Memory => Arc::new(MemoryCache::new(&config.memory)?),
            }
        };

        debug!(cache = name, enabled = config.enabled, "Cache initialized");
        Ok(Self {
            name: name.to_string(),
            backend,
            config,
        })
    }

    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            backend: Arc::new(NoOpCache),
            config: CacheConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn AppCache> {
        &self.backend
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    // ========================================================================
    // AppCache proxy methods
    // ========================================================================

    pub async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.backend.get(key).await
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<(), CacheError> {
        self.backend.set(key, value).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.backend.remove(key).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.backend.clear().await
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
