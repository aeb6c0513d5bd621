use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::adapter::{MemoryAdapter, StorageAdapter};
use crate::connection::{Connection, ConnectionFactory, ConnectionOptions};
use crate::error::DbResult;

/// Connection backed by its own [`MemoryAdapter`].
pub struct MemoryConnection {
    name: String,
    adapter: Arc<MemoryAdapter>,
    initialized: AtomicBool,
}

impl MemoryConnection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter: Arc::new(MemoryAdapter::new()),
            initialized: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn adapter(&self) -> Arc<dyn StorageAdapter> {
        self.adapter.clone()
    }

    async fn initialize(&self) -> DbResult<()> {
        self.adapter.connect().await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> DbResult<()> {
        self.adapter.disconnect().await?;
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Creates one isolated in-memory store per logical name.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryConnectionFactory;

impl ConnectionFactory for MemoryConnectionFactory {
    fn create(&self, options: ConnectionOptions) -> DbResult<Arc<dyn Connection>> {
        Ok(Arc::new(MemoryConnection::new(options.name)))
    }
}
