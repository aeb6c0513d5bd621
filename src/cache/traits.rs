//! AppCache trait definition.

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::CacheError;

/// Cache of action results.
///
/// Backends store JSON values so cached responses can be returned without
/// another storage round trip.
#[async_trait]
pub trait AppCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every entry.
    async fn clear(&self) -> Result<(), CacheError>;
}
