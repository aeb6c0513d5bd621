//! In-process broker dispatching actions to registered handlers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::broker::{Context, ServiceBroker};
use crate::error::{DbError, DbResult};
use crate::service::DbService;

type ActionHandler = Arc<dyn Fn(Context, Value) -> BoxFuture<'static, DbResult<Value>> + Send + Sync>;

/// Broker that resolves action names against an in-memory table.
///
/// Services expose their actions here (see [`LocalBroker::register_service`]) so
/// relation rules can reach them by name without a transport.
#[derive(Default)]
pub struct LocalBroker {
    actions: DashMap<String, ActionHandler>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action handler, replacing any handler with the same name.
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(Context, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DbResult<Value>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |ctx, params| handler(ctx, params).boxed());
        self.actions.insert(name.into(), handler);
        self
    }

    /// Expose every action of `service` under `<service>.<action>`.
    pub fn register_service(&self, service: &Arc<DbService>) -> &Self {
        service.register_actions(self);
        self
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Names of all registered actions, sorted.
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ServiceBroker for LocalBroker {
    async fn call(&self, ctx: &Context, action: &str, params: Value) -> DbResult<Value> {
        // clone out of the map so no shard lock is held across the await
        let handler = self
            .actions
            .get(action)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DbError::ActionNotFound {
                action: action.to_string(),
            })?;

        handler(ctx.clone(), params).await
    }
}
