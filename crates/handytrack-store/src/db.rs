//! Database connection management
//!
//! Opening failures are reported as `StoreUnavailable`; the runner treats
//! them as fatal and does not retry.

use crate::errors::{from_rusqlite, io_error, store_unavailable, Result};
use handytrack_core::errors::{ExError, MigrationError};
use rusqlite::Connection;
use std::path::Path;

/// Open a SQLite database at the given path, creating its directory if needed
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_error("create_store_dir", e))?;
        }
    }
    let conn = Connection::open(path).map_err(store_unavailable)?;
    configure(&conn).map_err(|e| {
        ExError::from(MigrationError::StoreUnavailable {
            reason: format!("{}: {}", path.display(), e.message()),
        })
    })?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(store_unavailable)?;
    configure(&conn)?;
    Ok(conn)
}

/// Configure a connection with the store's settings
pub fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(from_rusqlite)?;

    // journal_mode answers with the resulting mode ("memory" for in-memory stores)
    let _mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(from_rusqlite)?;

    Ok(())
}
