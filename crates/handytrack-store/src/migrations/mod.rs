//! Migration framework
//!
//! Provides:
//! - Versioned migration definitions with upgrade/downgrade steps
//! - The append-only migration history table
//! - A runner applying each pending migration in its own transaction
//! - The built-in HandyTrack catalog

pub mod catalog;
mod definition;
pub(crate) mod history;
mod pending;
mod result;
mod runner;

pub use definition::{MigrationDefinition, StepFn};
pub use history::{HistoryState, MigrationRecord};
pub use pending::PendingMigrations;
pub use result::{MigrationResult, MigrationStatus};
pub use runner::MigrationRunner;
