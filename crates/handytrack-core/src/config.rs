//! Runner configuration
//!
//! `RunnerConfig` is built once by the host (from defaults, an optional TOML
//! file, and command-line overrides) and passed to the runner explicitly.

use crate::errors::{ExError, ExErrorKind, MigrationError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default name of the migration-history table
pub const DEFAULT_HISTORY_TABLE: &str = "schema_migrations";

/// Default on-disk store location
pub const DEFAULT_STORE_PATH: &str = ".handytrack/handytrack.db";

/// Configuration for one migration runner
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Path of the SQLite store; `None` for in-memory stores
    pub store_path: Option<PathBuf>,

    /// Directory receiving pre-migration backups (defaults to the store's directory)
    pub backup_dir: Option<PathBuf>,

    /// Name of the migration-history table
    pub history_table: String,

    /// Number of backups to keep; older ones are pruned after each backup
    pub backup_retention: Option<usize>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            backup_dir: None,
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
            backup_retention: None,
        }
    }
}

impl RunnerConfig {
    /// Configuration for an on-disk store at `path`
    pub fn for_store(path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Set the backup directory
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Set the history table name
    pub fn with_history_table(mut self, table: impl Into<String>) -> Self {
        self.history_table = table.into();
        self
    }

    /// Keep at most `count` backups
    pub fn with_backup_retention(mut self, count: usize) -> Self {
        self.backup_retention = Some(count);
        self
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RunnerConfig = toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::Serialization)
                .with_op("parse_config")
                .with_message(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("read_config")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Directory where backups land, if one can be determined
    pub fn resolved_backup_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.backup_dir {
            return Some(dir.clone());
        }
        let parent = self.store_path.as_ref()?.parent()?;
        if parent.as_os_str().is_empty() {
            Some(PathBuf::from("."))
        } else {
            Some(parent.to_path_buf())
        }
    }

    /// Check the configuration is usable
    ///
    /// The history table name is spliced into SQL, so it must be a plain
    /// identifier that is neither an SQLite keyword nor a reserved
    /// `sqlite_` name.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.history_table) {
            return Err(MigrationError::InvalidConfig {
                reason: format!(
                    "history_table {:?} must match [A-Za-z_][A-Za-z0-9_]*",
                    self.history_table
                ),
            }
            .into());
        }
        if is_reserved(&self.history_table) {
            return Err(MigrationError::InvalidConfig {
                reason: format!(
                    "history_table {:?} is an SQLite keyword or reserved name",
                    self.history_table
                ),
            }
            .into());
        }
        if self.backup_retention == Some(0) {
            return Err(MigrationError::InvalidConfig {
                reason: "backup_retention must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_reserved(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    upper.starts_with("SQLITE_") || SQLITE_KEYWORDS.binary_search(&upper.as_str()).is_ok()
}

// https://sqlite.org/lang_keywords.html, sorted
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];
