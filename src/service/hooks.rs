//! Entity change notifications.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::Context;

/// Kind of write that changed the entity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityChange {
    Created,
    Updated,
    Removed,
}

impl EntityChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityChange::Created => "created",
            EntityChange::Updated => "updated",
            EntityChange::Removed => "removed",
        }
    }
}

impl fmt::Display for EntityChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives every change after the cache has been cleared.
///
/// `payload` is the transformed document, or an array for batch inserts.
#[async_trait]
pub trait EntityListener: Send + Sync {
    async fn entity_changed(&self, change: EntityChange, payload: &Value, ctx: &Context);
}
