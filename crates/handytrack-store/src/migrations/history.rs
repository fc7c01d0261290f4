//! Migration history table
//!
//! One row per applied migration, unique on version. Only the runner writes
//! here: `migrate` appends, `rollback` deletes.

use crate::errors::{from_rusqlite, Result};
use chrono::{DateTime, TimeZone, Utc};
use handytrack_core::errors::{ExError, ExErrorKind};
use handytrack_core::SchemaVersion;
use rusqlite::{params, Connection};
use serde::Serialize;

/// One applied migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub version: SchemaVersion,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// What the history table says about the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "version", rename_all = "snake_case")]
pub enum HistoryState {
    /// The history table does not exist
    Uninitialized,
    /// The table exists but holds no records
    Empty,
    /// Latest applied version
    At(SchemaVersion),
}

impl HistoryState {
    pub fn current_version(&self) -> Option<&SchemaVersion> {
        match self {
            HistoryState::At(version) => Some(version),
            HistoryState::Uninitialized | HistoryState::Empty => None,
        }
    }
}

/// SQLite resolves table names case-insensitively, so the lookup does too.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [table],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    Ok(count > 0)
}

/// Create the history table if it doesn't exist
///
/// `table` has been validated as a plain identifier by `RunnerConfig`.
pub(crate) fn ensure_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                version TEXT NOT NULL UNIQUE,
                applied_at INTEGER NOT NULL,
                description TEXT NOT NULL
            )",
            table
        ),
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// All applied migrations, ascending by version
pub(crate) fn load_records(conn: &Connection, table: &str) -> Result<Vec<MigrationRecord>> {
    if !table_exists(conn, table)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(&format!(
            "SELECT version, description, applied_at FROM {}",
            table
        ))
        .map_err(from_rusqlite)?;
    let rows: Vec<(String, String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut records = rows
        .into_iter()
        .map(|(version, description, applied_at)| -> Result<MigrationRecord> {
            let version = SchemaVersion::parse(&version).map_err(|e| {
                ExError::new(ExErrorKind::Persistence)
                    .with_op("read_history")
                    .with_version(version.clone())
                    .with_message("History table holds an unparseable version")
                    .with_source(e)
            })?;
            let applied_at = Utc
                .timestamp_millis_opt(applied_at)
                .single()
                .ok_or_else(|| {
                    ExError::new(ExErrorKind::Persistence)
                        .with_op("read_history")
                        .with_version(version.to_string())
                        .with_message(format!("Invalid applied_at timestamp {}", applied_at))
                })?;
            Ok(MigrationRecord {
                version,
                description,
                applied_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    records.sort_by(|a, b| a.version.cmp(&b.version));
    Ok(records)
}

pub(crate) fn read_state(conn: &Connection, table: &str) -> Result<HistoryState> {
    if !table_exists(conn, table)? {
        return Ok(HistoryState::Uninitialized);
    }
    Ok(match load_records(conn, table)?.pop() {
        Some(latest) => HistoryState::At(latest.version),
        None => HistoryState::Empty,
    })
}

pub(crate) fn insert_record(
    conn: &Connection,
    table: &str,
    version: &SchemaVersion,
    description: &str,
    applied_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (version, applied_at, description) VALUES (?1, ?2, ?3)",
            table
        ),
        params![version.as_str(), applied_at.timestamp_millis(), description],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// Delete the record for `version`, matching on the text stored by `migrate`
pub(crate) fn delete_record(conn: &Connection, table: &str, version: &SchemaVersion) -> Result<()> {
    let deleted = conn
        .execute(
            &format!("DELETE FROM {} WHERE version = ?1", table),
            [version.as_str()],
        )
        .map_err(from_rusqlite)?;

    if deleted != 1 {
        return Err(ExError::new(ExErrorKind::Persistence)
            .with_op("delete_history_record")
            .with_version(version.to_string())
            .with_message(format!("Expected to delete 1 history record, deleted {}", deleted)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "schema_migrations";

    #[test]
    fn test_uninitialized_then_empty_then_at() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_state(&conn, TABLE).unwrap(), HistoryState::Uninitialized);

        ensure_table(&conn, TABLE).unwrap();
        assert_eq!(read_state(&conn, TABLE).unwrap(), HistoryState::Empty);

        insert_record(&conn, TABLE, &SchemaVersion::new(1, 0, 0), "Initial", Utc::now()).unwrap();
        assert_eq!(
            read_state(&conn, TABLE).unwrap(),
            HistoryState::At(SchemaVersion::new(1, 0, 0))
        );
    }

    #[test]
    fn test_ensure_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn, TABLE).unwrap();
        ensure_table(&conn, TABLE).unwrap();
        assert!(table_exists(&conn, TABLE).unwrap());
    }

    #[test]
    fn test_table_lookup_ignores_case() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn, "hist").unwrap();
        insert_record(&conn, "hist", &SchemaVersion::new(1, 0, 0), "Initial", Utc::now()).unwrap();

        assert!(table_exists(&conn, "HIST").unwrap());
        assert_eq!(
            read_state(&conn, "Hist").unwrap(),
            HistoryState::At(SchemaVersion::new(1, 0, 0))
        );
    }

    #[test]
    fn test_latest_is_numeric_max_not_insertion_order() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn, TABLE).unwrap();
        for v in ["1.10.0", "1.3.0", "1.9.0"] {
            let version = SchemaVersion::parse(v).unwrap();
            insert_record(&conn, TABLE, &version, v, Utc::now()).unwrap();
        }

        let state = read_state(&conn, TABLE).unwrap();
        assert_eq!(state.current_version().map(|v| v.as_str()), Some("1.10.0"));

        let versions: Vec<String> = load_records(&conn, TABLE)
            .unwrap()
            .into_iter()
            .map(|r| r.version.to_string())
            .collect();
        assert_eq!(versions, vec!["1.3.0", "1.9.0", "1.10.0"]);
    }

    #[test]
    fn test_duplicate_version_rejected_by_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn, TABLE).unwrap();
        let version = SchemaVersion::new(1, 0, 0);
        insert_record(&conn, TABLE, &version, "Initial", Utc::now()).unwrap();

        let err = insert_record(&conn, TABLE, &version, "Initial", Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);
    }

    #[test]
    fn test_applied_at_round_trips_millis() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn, TABLE).unwrap();
        let at = Utc.timestamp_millis_opt(1_760_000_000_123).single().unwrap();
        insert_record(&conn, TABLE, &SchemaVersion::new(1, 0, 0), "Initial", at).unwrap();

        let records = load_records(&conn, TABLE).unwrap();
        assert_eq!(records[0].applied_at, at);
        assert_eq!(records[0].description, "Initial");
    }

    #[test]
    fn test_delete_missing_record_fails() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn, TABLE).unwrap();

        let err = delete_record(&conn, TABLE, &SchemaVersion::new(9, 0, 0)).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);
    }
}
