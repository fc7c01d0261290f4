//! Error handling for handytrack-store
//!
//! Wraps handytrack-core ExError with store-specific helpers

use handytrack_core::errors::{ExError, ExErrorKind, MigrationError};
use handytrack_core::SchemaVersion;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration step error carrying the definition's context
pub fn migration_error(version: &SchemaVersion, description: &str, reason: &str) -> ExError {
    MigrationError::MigrationExecution {
        version: version.to_string(),
        description: description.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Create a store-unavailable error (connection or transaction could not start)
pub fn store_unavailable(err: rusqlite::Error) -> ExError {
    MigrationError::StoreUnavailable {
        reason: err.to_string(),
    }
    .into()
}

/// Create a backup error
pub fn backup_failed(reason: impl std::fmt::Display) -> ExError {
    MigrationError::BackupFailed {
        reason: reason.to_string(),
    }
    .into()
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
