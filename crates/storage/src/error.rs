//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Could not open a connection
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// A statement failed on the server
    #[error("Query error: {0}")]
    Query(String),

    /// Schema inspection or migration failed
    #[error("Schema error: {0}")]
    Schema(String),

    /// A column value could not be converted
    #[error("Cannot decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A name that must be spliced into SQL is not a plain identifier
    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Writing an export file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn query(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}
