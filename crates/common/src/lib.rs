//! Common types and utilities for moduleqc
//!
//! This crate provides shared types used across all moduleqc crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (ModuleName, MacId, DataType, ModuleSelection)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
