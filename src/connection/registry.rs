use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionFactory, ConnectionOptions};
use crate::error::{DbError, DbResult};

/// Named connections owned by one service instance.
///
/// At most one connection per name is initialized at any time. `create` and
/// `get` fail fast; `close` turns a destroy failure into `Ok(false)` and
/// `close_many` reports one outcome per name.
pub struct ConnectionRegistry {
    factory: Arc<dyn ConnectionFactory>,
    connections: DashMap<String, Arc<dyn Connection>>,
}

impl ConnectionRegistry {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            connections: DashMap::new(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    pub fn get(&self, name: &str) -> DbResult<Arc<dyn Connection>> {
        self.connections
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DbError::connection_not_found(name))
    }

    /// Drop the entry without tearing the connection down.
    pub fn remove(&self, name: &str) -> DbResult<Arc<dyn Connection>> {
        self.connections
            .remove(name)
            .map(|(_, connection)| connection)
            .ok_or_else(|| DbError::connection_not_found(name))
    }

    /// Register a new unconnected connection under `options.name`.
    ///
    /// A stale uninitialized entry is replaced. The factory runs before the
    /// entry is locked, so it may read the registry; the initialized check is
    /// repeated under the entry guard before inserting.
    pub fn create(&self, options: ConnectionOptions) -> DbResult<Arc<dyn Connection>> {
        let name = options.name.clone();
        if self.is_active(&name) {
            return Err(DbError::AlreadyActiveConnection { name });
        }

        let connection = self.factory.create(options)?;
        match self.connections.entry(name.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_initialized() {
                    return Err(DbError::AlreadyActiveConnection { name });
                }
                entry.insert(connection.clone());
                debug!(connection = %name, "Replaced uninitialized connection");
            }
            Entry::Vacant(entry) => {
                entry.insert(connection.clone());
            }
        }

        info!(connection = %name, "Connection registered");
        Ok(connection)
    }

    fn is_active(&self, name: &str) -> bool {
        self.connections
            .get(name)
            .is_some_and(|entry| entry.value().is_initialized())
    }

    /// Destroy and unregister one connection.
    ///
    /// Unknown names fail with `ConnectionNotFound`. When destroy fails the
    /// result is `Ok(false)` and the entry stays registered and initialized,
    /// so `create` under the same name keeps failing with
    /// `AlreadyActiveConnection` until a later `close` succeeds.
    pub async fn close(&self, name: &str) -> DbResult<bool> {
        let connection = self.get(name)?;

        match connection.destroy().await {
            Ok(()) => {
                self.connections
                    .remove_if(name, |_, current| Arc::ptr_eq(current, &connection));
                info!(connection = %name, "Connection closed");
                Ok(true)
            }
            Err(e) => {
                warn!(connection = %name, error = %e, "Failed to destroy connection");
                Ok(false)
            }
        }
    }

    /// Close each name independently; one outcome per name, in input order.
    pub async fn close_many<S: AsRef<str>>(&self, names: &[S]) -> Vec<DbResult<bool>> {
        join_all(names.iter().map(|name| self.close(name.as_ref()))).await
    }

    pub async fn close_all(&self) -> Vec<DbResult<bool>> {
        let names = self.names();
        self.close_many(&names).await
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.names())
            .finish()
    }
}
