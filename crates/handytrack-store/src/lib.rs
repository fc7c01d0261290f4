//! HandyTrack Store - SQLite persistence and schema migrations
//!
//! Provides:
//! - Connection management for the SQLite store
//! - The versioned migration runner and its history table
//! - The built-in catalog of HandyTrack schema migrations
//! - Pre-migration backups
//! - Foreign-key consistency checks and schema fingerprints

pub mod backup;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod schema_check;

// Re-export key types
pub use errors::Result;
pub use migrations::{
    HistoryState, MigrationDefinition, MigrationRecord, MigrationResult, MigrationRunner,
    MigrationStatus,
};
