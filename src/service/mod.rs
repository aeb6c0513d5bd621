//! Data services.
//!
//! A [`DbService`] owns one storage adapter and exposes the CRUD actions
//! (`find`, `count`, `list`, `create`, `insert`, `get`, `update`, `remove`)
//! on top of it. Results go through the transformation pipeline, so callers
//! always see the configured identity field, projections and populated
//! relations.
//!
//! ```ignore
//! let broker = Arc::new(LocalBroker::new());
//! let users = Arc::new(DbService::builder(ServiceSettings::named("users")).build()?);
//! broker.register_service(&users);
//!
//! let ctx = Context::new(broker);
//! let page = users.list(&ctx, ListParams::default()).await?;
//! ```

mod db_service;
mod hooks;
mod params;
mod validators;

#[cfg(test)]
mod tests;

pub use db_service::{ACTIONS, DbService, DbServiceBuilder};
pub use hooks::{EntityChange, EntityListener};
pub use params::{
    CountParams, FindParams, GetParams, InsertParams, ListParams, RemoveParams, UpdateParams,
};
pub use validators::{EntityValidator, RequiredFieldsValidator, SchemaValidator};
