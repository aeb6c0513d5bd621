//! Remote invocation seam.
//!
//! Population and service-to-service calls go through [`ServiceBroker`]; the
//! crate ships [`LocalBroker`] for in-process wiring. A networked broker only
//! needs to implement the trait.

mod context;
mod local;

pub use context::Context;
pub use local::LocalBroker;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DbResult;

/// Invokes an operation on a peer service by name.
///
/// When `params.mapping` is `true`, implementations answer with an object
/// keyed by identity instead of an array.
#[async_trait]
pub trait ServiceBroker: Send + Sync {
    async fn call(&self, ctx: &Context, action: &str, params: Value) -> DbResult<Value>;
}
