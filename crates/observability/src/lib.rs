//! Observability infrastructure for moduleqc
//!
//! Every subcommand logs through `tracing`; this crate installs the
//! subscriber once at startup.
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("moduleqc", LogFormat::Pretty)?;
//! ```

pub mod logging;

pub use logging::{init_logging, LogFormat};
