//! HandyTrack Core - domain kernel for schema migrations
//!
//! This crate provides the pieces of the migration subsystem that do not
//! touch a database:
//! - `SchemaVersion` with numeric, component-wise ordering
//! - The error facility (`ExError`, `ExErrorKind`, `MigrationError`)
//! - Runner configuration (`RunnerConfig`)
//! - The structured logging facility

pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod version;

// Re-export commonly used types
pub use config::RunnerConfig;
pub use errors::{ExError, ExErrorKind, MigrationError, Result};
pub use version::SchemaVersion;
