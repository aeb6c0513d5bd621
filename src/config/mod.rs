//! Configuration management
//!
//! Layered loading, lowest priority first:
//! 1. `default.toml`
//! 2. `{environment}.toml` (`FUSION_DB_APP_ENV`)
//! 3. `local.toml`
//! 4. `FUSION_DB_*` environment variables, `__` separating nested keys

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    AdapterKind, AdapterSettings, CacheConfig, LoggerSettings, ServiceSettings, Settings,
};
