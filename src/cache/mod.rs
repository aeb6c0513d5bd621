//! Caching of action results.
//!
//! Each service owns a [`CacheManager`]; writes through the service clear it.
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"
//!
//! [cache.memory]
//! max_size = 1000
//! ttl_seconds = 300
//! ```

mod error;
mod manager;
mod memory;
mod noop;
mod traits;

pub use error::CacheError;
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub use noop::NoOpCache;
pub use traits::AppCache;

pub use crate::config::settings::{CacheBackend, CacheConfig, MemoryCacheConfig};
