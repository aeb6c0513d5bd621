//! Connection and factory contracts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::StorageAdapter;
use crate::error::DbResult;

/// Logical name used when none is given.
pub const DEFAULT_CONNECTION_NAME: &str = "default";

fn default_connection_name() -> String {
    DEFAULT_CONNECTION_NAME.to_string()
}

/// Options used to build a connection.
///
/// Everything besides `name` is backend specific and passed through to the
/// factory untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default = "default_connection_name")]
    pub name: String,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ConnectionOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::named(DEFAULT_CONNECTION_NAME)
    }
}

/// A named handle to a storage backend.
///
/// A freshly created connection is not connected; `initialize` connects it
/// and `destroy` tears it down.
#[async_trait]
pub trait Connection: Send + Sync {
    fn name(&self) -> &str;

    fn is_initialized(&self) -> bool;

    /// Storage adapter bound to this connection.
    fn adapter(&self) -> Arc<dyn StorageAdapter>;

    async fn initialize(&self) -> DbResult<()>;

    async fn destroy(&self) -> DbResult<()>;
}

/// Builds unconnected [`Connection`]s from options.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, options: ConnectionOptions) -> DbResult<Arc<dyn Connection>>;
}
