//! Point-in-time store backups
//!
//! Uses SQLite's online backup API so the copy is consistent even for WAL
//! stores, then verifies the copy with `PRAGMA quick_check`.

use crate::errors::{backup_failed, io_error, Result};
use chrono::{NaiveDateTime, Utc};
use handytrack_core::{RunnerConfig, SchemaVersion};
use rusqlite::backup::Backup;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BACKUP_SUFFIX: &str = ".bak.db";
const FRESH_LABEL: &str = "fresh";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";
const PAGES_PER_STEP: std::os::raw::c_int = 256;

/// Copy the store behind `conn` into the configured backup directory
///
/// Files are named `<store>-<utc timestamp>-<version>.bak.db`, so a name
/// sort is a chronological sort. Returns the path of the new backup.
pub fn backup_store(
    conn: &Connection,
    config: &RunnerConfig,
    version: Option<&SchemaVersion>,
) -> Result<PathBuf> {
    let dir = config.resolved_backup_dir().ok_or_else(|| {
        backup_failed("no backup directory configured and the store has no file path")
    })?;
    std::fs::create_dir_all(&dir).map_err(|e| io_error("create_backup_dir", e))?;

    let stem = store_stem(config);
    let label = version
        .map(|v| v.to_string())
        .unwrap_or_else(|| FRESH_LABEL.to_string());
    let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
    let path = unused_path(&dir, &format!("{}-{}-{}", stem, timestamp, label));

    copy_consistent(conn, &path)?;
    tracing::info!(backup_path = %path.display(), "Store backup written");

    if let Some(keep) = config.backup_retention {
        prune(&dir, &stem, keep, Some(&path))?;
    }
    Ok(path)
}

/// Delete the oldest backups of `stem` in `dir` beyond `keep`
///
/// Only files named exactly `<stem>-<timestamp>-<version|fresh>[_NNN].bak.db`
/// count, so backups of `app-staging.db` are never pruned on behalf of
/// `app.db`. Returns the removed paths. A file that cannot be removed is
/// logged and left in place.
pub fn prune_backups(dir: &Path, stem: &str, keep: usize) -> Result<Vec<PathBuf>> {
    prune(dir, stem, keep, None)
}

fn prune(dir: &Path, stem: &str, keep: usize, protect: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut backups: Vec<(NaiveDateTime, PathBuf)> = std::fs::read_dir(dir)
        .map_err(|e| io_error("list_backups", e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter_map(|p| {
            let taken_at = p
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| backup_timestamp(n, stem))?;
            Some((taken_at, p))
        })
        .collect();

    if backups.len() <= keep {
        return Ok(Vec::new());
    }

    backups.sort();
    let excess = backups.len() - keep;
    let mut removed = Vec::with_capacity(excess);
    for (_, old) in backups.into_iter() {
        if removed.len() == excess {
            break;
        }
        if protect.map_or(false, |p| p == old) {
            continue;
        }
        match std::fs::remove_file(&old) {
            Ok(()) => removed.push(old),
            Err(e) => tracing::warn!(path = %old.display(), error = %e, "Failed to prune backup"),
        }
    }
    Ok(removed)
}

/// When the backup named `name` was taken, if it is a backup of `stem`
fn backup_timestamp(name: &str, stem: &str) -> Option<NaiveDateTime> {
    let rest = name
        .strip_prefix(stem)?
        .strip_prefix('-')?
        .strip_suffix(BACKUP_SUFFIX)?;
    let (timestamp, label) = rest.split_once('-')?;
    let label = match label.rsplit_once('_') {
        Some((base, n)) if n.len() == 3 && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => label,
    };
    if label != FRESH_LABEL && SchemaVersion::parse(label).is_err() {
        return None;
    }
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()
}

fn copy_consistent(src: &Connection, dst_path: &Path) -> Result<()> {
    let mut dst = Connection::open(dst_path).map_err(|e| {
        backup_failed(format!("cannot create {}: {}", dst_path.display(), e))
    })?;

    {
        let backup = Backup::new(src, &mut dst)
            .map_err(|e| backup_failed(format!("cannot start backup: {}", e)))?;
        backup
            .run_to_completion(PAGES_PER_STEP, Duration::from_millis(0), None)
            .map_err(|e| backup_failed(format!("backup did not complete: {}", e)))?;
    }

    let integrity: String = dst
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| backup_failed(format!("integrity check failed: {}", e)))?;
    if integrity != "ok" {
        return Err(backup_failed(format!(
            "integrity check of {} reported: {}",
            dst_path.display(),
            integrity
        )));
    }
    Ok(())
}

fn store_stem(config: &RunnerConfig) -> String {
    config
        .store_path
        .as_ref()
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("memory")
        .to_string()
}

fn unused_path(dir: &Path, base: &str) -> PathBuf {
    let first = dir.join(format!("{}{}", base, BACKUP_SUFFIX));
    if !first.exists() {
        return first;
    }
    // '_' sorts after '.', keeping name order chronological within one timestamp
    (1..)
        .map(|n| dir.join(format!("{}_{:03}{}", base, n, BACKUP_SUFFIX)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
