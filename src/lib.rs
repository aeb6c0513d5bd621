//! fusion-db
//!
//! Data-access layer for services: generic CRUD actions over a storage
//! adapter, cross-service relation population, and a registry of named
//! connections for multi-tenant deployments.
//!
//! - [`document`]: dotted-path access, identity renaming, field projection
//! - [`populate`]: relation rules and the batched population engine
//! - [`transform`]: the pipeline turning stored records into API documents
//! - [`connection`]: named connection registry
//! - [`service`]: the `DbService` actions
//! - [`broker`]: call context and in-process action dispatch

pub mod adapter;
pub mod broker;
pub mod cache;
pub mod config;
pub mod connection;
pub mod document;
pub mod error;
pub mod logger;
pub mod populate;
pub mod service;
pub mod transform;

pub use broker::{Context, LocalBroker, ServiceBroker};
pub use error::{DbError, DbResult};
pub use service::DbService;

pub fn pkg_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
