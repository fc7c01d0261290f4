//! Runner outcomes

use super::history::{HistoryState, MigrationRecord};
use handytrack_core::errors::ExError;
use handytrack_core::SchemaVersion;
use handytrack_core_types::RunId;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one `migrate` or `rollback` call
///
/// Never an `Err`: failures are reported here with the versions that did
/// commit before the failing step, so an operator can decide how to repair.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub message: String,
    /// Versions upgraded by this call, in application order
    pub applied_versions: Vec<SchemaVersion>,
    /// Versions downgraded by this call, in rollback order
    pub reverted_versions: Vec<SchemaVersion>,
    pub backup_path: Option<PathBuf>,
    pub warnings: Vec<String>,
    pub error_code: Option<&'static str>,
    pub duration_ms: u64,
    pub run_id: RunId,
    #[serde(skip)]
    pub error: Option<ExError>,
}

impl MigrationResult {
    pub(crate) fn new(run_id: RunId) -> Self {
        Self {
            success: false,
            message: String::new(),
            applied_versions: Vec::new(),
            reverted_versions: Vec::new(),
            backup_path: None,
            warnings: Vec::new(),
            error_code: None,
            duration_ms: 0,
            run_id,
            error: None,
        }
    }

    pub(crate) fn succeed(&mut self, message: String) {
        self.success = true;
        self.message = with_warnings(message, &self.warnings);
    }

    pub(crate) fn fail(&mut self, message: String, error: ExError) {
        self.success = false;
        self.error_code = Some(error.code());
        self.error = Some(error);
        self.message = with_warnings(message, &self.warnings);
    }

    /// True when a failure happened after some versions had committed
    pub fn is_partial(&self) -> bool {
        !self.success && !(self.applied_versions.is_empty() && self.reverted_versions.is_empty())
    }
}

fn with_warnings(message: String, warnings: &[String]) -> String {
    if warnings.is_empty() {
        message
    } else {
        format!("{} (warnings: {})", message, warnings.join("; "))
    }
}

/// Snapshot of the store against the known definitions
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub state: HistoryState,
    pub current_version: Option<SchemaVersion>,
    /// Highest version among the definitions
    pub latest_version: Option<SchemaVersion>,
    pub pending: Vec<SchemaVersion>,
    pub applied: Vec<MigrationRecord>,
    /// Applied versions with no matching definition (store is newer than the application)
    pub orphaned: Vec<SchemaVersion>,
    /// Definitions at or below the current version that were never applied
    pub skipped: Vec<SchemaVersion>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }
}
