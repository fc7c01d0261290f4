//! Migration runner
//!
//! Applies pending migrations in ascending version order, each inside its
//! own transaction together with its history record. A failing step is
//! rolled back and stops the run; steps that already committed stay.

use super::definition::MigrationDefinition;
use super::history::{self, HistoryState, MigrationRecord};
use super::pending::PendingMigrations;
use super::result::{MigrationResult, MigrationStatus};
use crate::backup;
use crate::errors::{from_rusqlite, migration_error, store_unavailable, Result};
use chrono::Utc;
use handytrack_core::errors::{ExError, MigrationError};
use handytrack_core::{log_op_end, log_op_error, log_op_start, RunnerConfig, SchemaVersion};
use handytrack_core_types::RunId;
use rusqlite::Connection;
use std::collections::HashSet;
use std::time::Instant;

/// Brings a store from its recorded version to the latest known definition
///
/// Holds the connection mutably for its whole lifetime; no other writer
/// touches the store while a runner exists.
pub struct MigrationRunner<'c> {
    conn: &'c mut Connection,
    config: RunnerConfig,
    definitions: Vec<MigrationDefinition>,
}

impl<'c> MigrationRunner<'c> {
    /// Create a runner; definitions may be given in any order
    pub fn new(
        conn: &'c mut Connection,
        config: RunnerConfig,
        mut definitions: Vec<MigrationDefinition>,
    ) -> Result<Self> {
        config.validate()?;
        definitions.sort_by(|a, b| a.version().cmp(b.version()));
        Ok(Self {
            conn,
            config,
            definitions,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Known definitions, ascending by version
    pub fn definitions(&self) -> &[MigrationDefinition] {
        &self.definitions
    }

    /// Whether the history table exists and what it holds
    pub fn history_state(&self) -> Result<HistoryState> {
        history::read_state(&*self.conn, &self.config.history_table)
    }

    /// Latest applied version, `None` on a fresh store
    pub fn current_version(&self) -> Result<Option<SchemaVersion>> {
        Ok(self.history_state()?.current_version().cloned())
    }

    /// Full history, ascending by version
    pub fn applied_migrations(&self) -> Result<Vec<MigrationRecord>> {
        history::load_records(&*self.conn, &self.config.history_table)
    }

    /// Definitions newer than the current version, ascending
    pub fn pending_migrations(&self) -> Result<PendingMigrations<'_>> {
        let start = self.pending_start()?;
        Ok(PendingMigrations::new(&self.definitions[start..]))
    }

    /// Compare the store's history against the known definitions
    pub fn status(&self) -> Result<MigrationStatus> {
        self.check_ordering()?;
        let state = self.history_state()?;
        let applied = self.applied_migrations()?;
        let current = state.current_version().cloned();

        let applied_versions: HashSet<&SchemaVersion> = applied.iter().map(|r| &r.version).collect();
        let known: HashSet<&SchemaVersion> = self.definitions.iter().map(|d| d.version()).collect();

        let orphaned = applied
            .iter()
            .filter(|r| !known.contains(&r.version))
            .map(|r| r.version.clone())
            .collect();
        let skipped = self
            .definitions
            .iter()
            .filter(|d| current.as_ref().is_some_and(|c| d.version() <= c))
            .filter(|d| !applied_versions.contains(d.version()))
            .map(|d| d.version().clone())
            .collect();
        let pending = self.pending_migrations()?.versions();

        Ok(MigrationStatus {
            state,
            current_version: current,
            latest_version: self.definitions.last().map(|d| d.version().clone()),
            pending,
            applied,
            orphaned,
            skipped,
        })
    }

    /// Apply every pending migration
    ///
    /// With `backup`, the store is copied before the first step; a failed
    /// backup stops the run before anything is applied.
    pub fn migrate(&mut self, backup: bool) -> MigrationResult {
        let run_id = RunId::new();
        let started = Instant::now();
        log_op_start!("migrate", run_id = %run_id, backup = backup);

        let mut result = MigrationResult::new(run_id.clone());
        let outcome = self.run_migrate(backup, &run_id, &mut result);
        result.duration_ms = elapsed_ms(started);

        match outcome {
            Ok(message) => {
                log_op_end!(
                    "migrate",
                    duration_ms = result.duration_ms,
                    run_id = %run_id,
                    applied_len = result.applied_versions.len(),
                );
                result.succeed(message);
            }
            Err(err) => {
                log_op_error!(
                    "migrate",
                    err.clone(),
                    duration_ms = result.duration_ms,
                    run_id = %run_id,
                    applied_len = result.applied_versions.len(),
                );
                let message = failure_message("Migration", "applying", result.applied_versions.len(), &err);
                result.fail(message, err);
            }
        }
        result
    }

    /// Downgrade every applied migration newer than `to_version`, newest first
    ///
    /// Every target must have a definition with a downgrade step; this is
    /// checked before anything runs.
    pub fn rollback(&mut self, to_version: &SchemaVersion) -> MigrationResult {
        let run_id = RunId::new();
        let started = Instant::now();
        log_op_start!("rollback", run_id = %run_id, target_version = %to_version);

        let mut result = MigrationResult::new(run_id.clone());
        let outcome = self.run_rollback(to_version, &run_id, &mut result);
        result.duration_ms = elapsed_ms(started);

        match outcome {
            Ok(message) => {
                log_op_end!(
                    "rollback",
                    duration_ms = result.duration_ms,
                    run_id = %run_id,
                    reverted_len = result.reverted_versions.len(),
                );
                result.succeed(message);
            }
            Err(err) => {
                log_op_error!(
                    "rollback",
                    err.clone(),
                    duration_ms = result.duration_ms,
                    run_id = %run_id,
                    reverted_len = result.reverted_versions.len(),
                );
                let message = failure_message("Rollback", "reverting", result.reverted_versions.len(), &err);
                result.fail(message, err);
            }
        }
        result
    }

    fn run_migrate(
        &mut self,
        backup: bool,
        run_id: &RunId,
        result: &mut MigrationResult,
    ) -> Result<String> {
        let current = self.current_version()?;
        let start = self.pending_start()?;
        result.warnings = self.collect_warnings(current.as_ref(), start)?;
        for warning in &result.warnings {
            tracing::warn!(run_id = %run_id, "{}", warning);
        }

        if start == self.definitions.len() {
            return Ok(match &current {
                Some(version) => format!("Database already at latest version {}", version),
                None => "No migrations defined; database already at latest version".to_string(),
            });
        }

        if backup {
            let path = backup::backup_store(&*self.conn, &self.config, current.as_ref())?;
            result.backup_path = Some(path);
        }

        let table = self.config.history_table.clone();
        for def in &self.definitions[start..] {
            apply_step(&mut *self.conn, &table, def, run_id)?;
            result.applied_versions.push(def.version().clone());
        }

        let n = result.applied_versions.len();
        let latest = self.definitions[self.definitions.len() - 1].version();
        Ok(format!(
            "Applied {} migration(s); database now at version {}",
            n, latest
        ))
    }

    fn run_rollback(
        &mut self,
        to_version: &SchemaVersion,
        run_id: &RunId,
        result: &mut MigrationResult,
    ) -> Result<String> {
        self.check_ordering()?;
        if self.history_state()? == HistoryState::Uninitialized {
            return Err(MigrationError::StoreNotInitialized {
                table: self.config.history_table.clone(),
            }
            .into());
        }

        let targets: Vec<MigrationRecord> = self
            .applied_migrations()?
            .into_iter()
            .rev()
            .filter(|r| r.version > *to_version)
            .collect();

        if targets.is_empty() {
            return Ok(format!(
                "Database already at or below version {}",
                to_version
            ));
        }

        let mut plan = Vec::with_capacity(targets.len());
        for record in &targets {
            let index = self
                .definition_index(&record.version)
                .filter(|&i| self.definitions[i].has_downgrade())
                .ok_or_else(|| {
                    ExError::from(MigrationError::MissingDowngrade {
                        version: record.version.to_string(),
                    })
                    .with_description(record.description.clone())
                })?;
            plan.push((record, index));
        }

        let table = self.config.history_table.clone();
        for (record, index) in plan {
            let def = &self.definitions[index];
            revert_step(&mut *self.conn, &table, def, &record.version, run_id)?;
            result.reverted_versions.push(record.version.clone());
        }

        let now = self
            .current_version()?
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string());
        Ok(format!(
            "Rolled back {} migration(s); database now at version {}",
            result.reverted_versions.len(),
            now
        ))
    }

    fn check_ordering(&self) -> Result<()> {
        match self
            .definitions
            .windows(2)
            .find(|pair| pair[0].version() == pair[1].version())
        {
            Some(pair) => Err(MigrationError::VersionOrdering {
                version: pair[1].version().to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Index of the first pending definition
    fn pending_start(&self) -> Result<usize> {
        self.check_ordering()?;
        Ok(match self.current_version()? {
            None => 0,
            Some(current) => self
                .definitions
                .partition_point(|d| *d.version() <= current),
        })
    }

    fn definition_index(&self, version: &SchemaVersion) -> Option<usize> {
        self.definitions
            .binary_search_by(|d| d.version().cmp(version))
            .ok()
    }

    /// Skipped definitions and numbering gaps; neither blocks the run
    fn collect_warnings(
        &self,
        current: Option<&SchemaVersion>,
        start: usize,
    ) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if let Some(current) = current {
            let applied: HashSet<SchemaVersion> = self
                .applied_migrations()?
                .into_iter()
                .map(|r| r.version)
                .collect();
            for def in &self.definitions[..start] {
                if !applied.contains(def.version()) {
                    warnings.push(format!(
                        "Migration {} is not above current version {} and was never applied; skipped",
                        def.version(),
                        current
                    ));
                }
            }
        }

        let mut prev = current;
        for def in &self.definitions[start..] {
            if let Some(p) = prev {
                if !def.version().is_successor_of(p) {
                    warnings.push(format!("Version gap: {} -> {}", p, def.version()));
                }
            }
            prev = Some(def.version());
        }

        Ok(warnings)
    }
}

fn apply_step(
    conn: &mut Connection,
    table: &str,
    def: &MigrationDefinition,
    run_id: &RunId,
) -> Result<()> {
    let started = Instant::now();
    log_op_start!(
        "migration_step",
        run_id = %run_id,
        version = %def.version(),
        description = def.description(),
    );

    match upgrade_in_transaction(conn, table, def) {
        Ok(()) => {
            log_op_end!(
                "migration_step",
                duration_ms = elapsed_ms(started),
                run_id = %run_id,
                version = %def.version(),
            );
            Ok(())
        }
        Err(err) => {
            log_op_error!(
                "migration_step",
                err.clone(),
                duration_ms = elapsed_ms(started),
                run_id = %run_id,
                version = %def.version(),
                description = def.description(),
            );
            Err(err)
        }
    }
}

fn upgrade_in_transaction(conn: &mut Connection, table: &str, def: &MigrationDefinition) -> Result<()> {
    // Dropping `tx` on any early return rolls the step back, history table included.
    let tx = conn.transaction().map_err(store_unavailable)?;
    history::ensure_table(&tx, table).map_err(|e| step_failure(def, e))?;
    def.run_upgrade(&tx)
        .map_err(|e| migration_error(def.version(), def.description(), &e.to_string()))?;
    history::insert_record(&tx, table, def.version(), def.description(), Utc::now())
        .map_err(|e| step_failure(def, e))?;
    tx.commit()
        .map_err(|e| step_failure(def, from_rusqlite(e)))?;
    Ok(())
}

fn revert_step(
    conn: &mut Connection,
    table: &str,
    def: &MigrationDefinition,
    recorded: &SchemaVersion,
    run_id: &RunId,
) -> Result<()> {
    let started = Instant::now();
    log_op_start!(
        "rollback_step",
        run_id = %run_id,
        version = %recorded,
        description = def.description(),
    );

    match downgrade_in_transaction(conn, table, def, recorded) {
        Ok(()) => {
            log_op_end!(
                "rollback_step",
                duration_ms = elapsed_ms(started),
                run_id = %run_id,
                version = %recorded,
            );
            Ok(())
        }
        Err(err) => {
            log_op_error!(
                "rollback_step",
                err.clone(),
                duration_ms = elapsed_ms(started),
                run_id = %run_id,
                version = %recorded,
                description = def.description(),
            );
            Err(err)
        }
    }
}

fn downgrade_in_transaction(
    conn: &mut Connection,
    table: &str,
    def: &MigrationDefinition,
    recorded: &SchemaVersion,
) -> Result<()> {
    let tx = conn.transaction().map_err(store_unavailable)?;
    match def.run_downgrade(&tx) {
        None => {
            return Err(MigrationError::MissingDowngrade {
                version: recorded.to_string(),
            }
            .into())
        }
        Some(Err(e)) => {
            return Err(migration_error(def.version(), def.description(), &e.to_string()))
        }
        Some(Ok(())) => {}
    }
    history::delete_record(&tx, table, recorded).map_err(|e| step_failure(def, e))?;
    tx.commit()
        .map_err(|e| step_failure(def, from_rusqlite(e)))?;
    Ok(())
}

fn step_failure(def: &MigrationDefinition, err: ExError) -> ExError {
    migration_error(def.version(), def.description(), err.message()).with_source(err)
}

fn failure_message(what: &str, verb: &str, completed: usize, err: &ExError) -> String {
    match err.version() {
        Some(version) => format!(
            "{} {} failed after {} {} migration(s): {}",
            what, version, verb, completed, err
        ),
        None => format!(
            "{} run failed after {} {} migration(s): {}",
            what, verb, completed, err
        ),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
