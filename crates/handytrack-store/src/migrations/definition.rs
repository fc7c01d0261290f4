//! Migration definitions
//!
//! A definition pairs a version with an upgrade step and, optionally, the
//! inverse downgrade step. Steps receive the connection of the transaction
//! the runner opened for them and must not commit themselves. A step that
//! panics is reported as a failed step.

use handytrack_core::SchemaVersion;
use rusqlite::Connection;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A migration step
pub type StepFn = Box<dyn Fn(&Connection) -> rusqlite::Result<()> + Send + Sync>;

/// One available migration, supplied by the host application
pub struct MigrationDefinition {
    version: SchemaVersion,
    description: String,
    upgrade: StepFn,
    downgrade: Option<StepFn>,
}

impl MigrationDefinition {
    /// Create a definition from an upgrade closure
    pub fn new<F>(version: SchemaVersion, description: impl Into<String>, upgrade: F) -> Self
    where
        F: Fn(&Connection) -> rusqlite::Result<()> + Send + Sync + 'static,
    {
        Self {
            version,
            description: description.into(),
            upgrade: Box::new(upgrade),
            downgrade: None,
        }
    }

    /// Create a definition whose upgrade is a SQL batch
    pub fn sql(
        version: SchemaVersion,
        description: impl Into<String>,
        upgrade_sql: impl Into<String>,
    ) -> Self {
        let sql = upgrade_sql.into();
        Self::new(version, description, move |conn| conn.execute_batch(&sql))
    }

    /// Attach a downgrade closure
    pub fn with_downgrade<F>(mut self, downgrade: F) -> Self
    where
        F: Fn(&Connection) -> rusqlite::Result<()> + Send + Sync + 'static,
    {
        self.downgrade = Some(Box::new(downgrade));
        self
    }

    /// Attach a downgrade SQL batch
    pub fn with_downgrade_sql(self, downgrade_sql: impl Into<String>) -> Self {
        let sql = downgrade_sql.into();
        self.with_downgrade(move |conn| conn.execute_batch(&sql))
    }

    pub fn version(&self) -> &SchemaVersion {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn has_downgrade(&self) -> bool {
        self.downgrade.is_some()
    }

    pub(crate) fn run_upgrade(&self, conn: &Connection) -> rusqlite::Result<()> {
        run_guarded(&self.upgrade, conn)
    }

    /// `None` when the definition has no downgrade step
    pub(crate) fn run_downgrade(&self, conn: &Connection) -> Option<rusqlite::Result<()>> {
        self.downgrade.as_ref().map(|step| run_guarded(step, conn))
    }
}

// The runner drops the step's transaction on error, so a panicking step
// leaves nothing behind.
fn run_guarded(step: &StepFn, conn: &Connection) -> rusqlite::Result<()> {
    catch_unwind(AssertUnwindSafe(|| step(conn))).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Err(rusqlite::Error::UserFunctionError(
            format!("step panicked: {}", detail).into(),
        ))
    })
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDefinition")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("has_downgrade", &self.has_downgrade())
            .finish()
    }
}
