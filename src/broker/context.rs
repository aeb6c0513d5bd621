//! Call context passed through actions and population.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::broker::ServiceBroker;
use crate::error::DbResult;

/// Request-scoped context.
///
/// Holds the broker used for remote calls and the request metadata. Every
/// nested call runs with a child context whose `level` is one deeper, which
/// makes the depth of recursive population visible in logs.
#[derive(Clone)]
pub struct Context {
    broker: Arc<dyn ServiceBroker>,
    meta: Map<String, Value>,
    level: usize,
}

impl Context {
    pub fn new(broker: Arc<dyn ServiceBroker>) -> Self {
        Self {
            broker,
            meta: Map::new(),
            level: 1,
        }
    }

    /// Attach request metadata, forwarded unchanged to nested calls.
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn broker(&self) -> &Arc<dyn ServiceBroker> {
        &self.broker
    }

    /// Invoke a remote action by name.
    pub async fn call(&self, action: &str, params: Value) -> DbResult<Value> {
        let child = Self {
            broker: Arc::clone(&self.broker),
            meta: self.meta.clone(),
            level: self.level + 1,
        };

        tracing::debug!(action, level = child.level, "Calling action");
        self.broker.call(&child, action, params).await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("meta", &self.meta)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
