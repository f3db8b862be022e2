//! PostgreSQL storage for module QC data
//!
//! Remote MAC databases are read through [`MacClient`]; the local mirror is
//! managed by [`LocalDatabase`]. Every call opens one connection, runs its
//! statements and closes it again.

pub mod connection;
pub mod error;
pub mod export;
pub mod local;
pub mod mac;
pub mod query;
pub mod record;
pub mod schema;

pub use connection::ConnectionSettings;
pub use error::StorageError;
pub use local::{DatabaseCreation, LocalDatabase, ModuleTestRecord, NewModuleTest};
pub use mac::MacClient;
pub use record::{CellValue, Record};
pub use schema::{ColumnSpec, ColumnType, SchemaChange, SchemaPlan};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
