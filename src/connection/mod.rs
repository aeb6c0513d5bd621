//! Named connections for multi-tenant deployments.

mod memory;
mod registry;
mod traits;

pub use memory::{MemoryConnection, MemoryConnectionFactory};
pub use registry::ConnectionRegistry;
pub use traits::{Connection, ConnectionFactory, ConnectionOptions, DEFAULT_CONNECTION_NAME};
