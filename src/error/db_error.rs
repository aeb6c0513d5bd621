use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::CacheError;
use crate::config::error::ConfigError;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFieldError {
    pub field: String,
    pub message: String,
}

impl ValidationFieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error type shared by every data-access operation in the crate.
///
/// Connection lookups and entity lookups fail fast with dedicated variants;
/// failures raised by remote actions during population are propagated
/// unchanged, whatever variant the peer produced.
#[derive(Error, Debug)]
pub enum DbError {
    /// No connection is registered under the logical name
    #[error("Connection not found: {name}")]
    ConnectionNotFound { name: String },

    /// A connection under the logical name is already initialized
    #[error("Connection '{name}' is already active")]
    AlreadyActiveConnection { name: String },

    /// Identity lookup matched no record
    #[error("Entity not found: {id}")]
    EntityNotFound { id: Value },

    /// Entity validation failed before a write
    #[error("Validation failed for {entity}: {}", format_field_errors(.errors))]
    Validation {
        entity: String,
        errors: Vec<ValidationFieldError>,
    },

    /// Action parameters could not be sanitized
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    /// The broker has no handler for the action name
    #[error("Action not found: {action}")]
    ActionNotFound { action: String },

    /// Storage adapter operation failed
    #[error("Adapter operation failed: {operation}")]
    Adapter {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Connection initialize or destroy failed
    #[error("Connection '{name}' failed")]
    Connection {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl DbError {
    pub fn connection_not_found(name: impl Into<String>) -> Self {
        DbError::ConnectionNotFound { name: name.into() }
    }

    pub fn entity_not_found(id: impl Into<Value>) -> Self {
        DbError::EntityNotFound { id: id.into() }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        DbError::InvalidParams {
            message: message.into(),
        }
    }

    pub fn adapter(operation: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        DbError::Adapter {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Whether this error is one of the "not found" variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::ConnectionNotFound { .. }
                | DbError::EntityNotFound { .. }
                | DbError::ActionNotFound { .. }
        )
    }
}

impl From<anyhow::Error> for DbError {
    fn from(error: anyhow::Error) -> Self {
        DbError::Internal { source: error }
    }
}

fn format_field_errors(errors: &[ValidationFieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Type alias for Result with DbError to simplify function signatures
pub type DbResult<T> = Result<T, DbError>;
