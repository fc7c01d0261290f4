//! Schema consistency checks
//!
//! The foreign keys the tracker relies on are declared statically here and
//! compared against `PRAGMA foreign_key_list` of the live store. The schema
//! fingerprint is a SHA256 over `sqlite_master`, used to compare two stores
//! (or one store before and after a migrate/rollback cycle).

use crate::errors::{from_rusqlite, Result};
use crate::migrations::history;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A foreign key the schema is expected to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDecl {
    pub table: &'static str,
    pub column: &'static str,
    pub referenced_table: &'static str,
    pub referenced_column: &'static str,
}

const fn fk(
    table: &'static str,
    column: &'static str,
    referenced_table: &'static str,
    referenced_column: &'static str,
) -> ForeignKeyDecl {
    ForeignKeyDecl {
        table,
        column,
        referenced_table,
        referenced_column,
    }
}

/// Foreign keys of the built-in catalog at its latest version
pub const FOREIGN_KEYS: &[ForeignKeyDecl] = &[
    fk("employees", "user_id", "users", "id"),
    fk("evaluations", "employee_id", "employees", "id"),
    fk("evaluations", "evaluator_id", "users", "id"),
    fk("evaluation_skills", "evaluation_id", "evaluations", "id"),
    fk("evaluation_skills", "skill_id", "skills", "id"),
    fk("evaluation_tools", "evaluation_id", "evaluations", "id"),
    fk("evaluation_tools", "tool_id", "tools", "id"),
    fk("audit_log", "user_id", "users", "id"),
];

/// A declared foreign key the store does not match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDrift {
    pub declared: ForeignKeyDecl,
    pub reason: String,
}

/// Compare `decls` against the store's actual foreign keys
///
/// Returns one entry per declaration that is missing or points elsewhere;
/// an empty vector means the store matches.
pub fn check_foreign_keys(conn: &Connection, decls: &[ForeignKeyDecl]) -> Result<Vec<SchemaDrift>> {
    let mut drift = Vec::new();

    for decl in decls {
        if !history::table_exists(conn, decl.table)? {
            drift.push(SchemaDrift {
                declared: *decl,
                reason: format!("table {} does not exist", decl.table),
            });
            continue;
        }

        let actual = foreign_keys_of(conn, decl.table)?;
        let from_column: Vec<&(String, String, String)> = actual
            .iter()
            .filter(|(_, from, _)| from == decl.column)
            .collect();

        if from_column.is_empty() {
            drift.push(SchemaDrift {
                declared: *decl,
                reason: format!("{}.{} has no foreign key", decl.table, decl.column),
            });
            continue;
        }

        let matches = from_column.iter().any(|(table, _, to)| {
            table == decl.referenced_table && to.as_str() == decl.referenced_column
        });
        if !matches {
            let found: Vec<String> = from_column
                .iter()
                .map(|(table, _, to)| format!("{}.{}", table, to))
                .collect();
            drift.push(SchemaDrift {
                declared: *decl,
                reason: format!(
                    "{}.{} references {} instead of {}.{}",
                    decl.table,
                    decl.column,
                    found.join(", "),
                    decl.referenced_table,
                    decl.referenced_column
                ),
            });
        }
    }

    Ok(drift)
}

/// `(referenced_table, from_column, to_column)` for each foreign key of `table`
fn foreign_keys_of(conn: &Connection, table: &str) -> Result<Vec<(String, String, String)>> {
    let mut stmt = conn
        .prepare(r#"SELECT "table", "from", "to" FROM pragma_foreign_key_list(?1)"#)
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([table], |row| {
            // "to" is NULL when the key references the parent's primary key implicitly
            let to: Option<String> = row.get(2)?;
            Ok((row.get(0)?, row.get(1)?, to.unwrap_or_else(|| "id".to_string())))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// SHA256 over the store's schema objects, hex encoded
///
/// Internal `sqlite_%` objects and the tables named in `exclude` (usually the
/// history table) are left out.
pub fn schema_fingerprint(conn: &Connection, exclude: &[&str]) -> Result<String> {
    let mut stmt = conn
        .prepare(
            "SELECT type, name, tbl_name, COALESCE(sql, '') FROM sqlite_master
             WHERE name NOT LIKE 'sqlite_%'
             ORDER BY type, name",
        )
        .map_err(from_rusqlite)?;
    let objects: Vec<(String, String, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut hasher = Sha256::new();
    for (kind, name, table, sql) in objects {
        if exclude.iter().any(|t| t.eq_ignore_ascii_case(&table)) {
            continue;
        }
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(sql.as_bytes());
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(sql: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(sql).unwrap();
        conn
    }

    const USERS: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL);";

    #[test]
    fn test_matching_foreign_key() {
        let conn = store_with(&format!(
            "{} CREATE TABLE employees (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));",
            USERS
        ));
        let drift = check_foreign_keys(&conn, &FOREIGN_KEYS[..1]).unwrap();
        assert!(drift.is_empty(), "{:?}", drift);
    }

    #[test]
    fn test_implicit_primary_key_reference() {
        let conn = store_with(&format!(
            "{} CREATE TABLE employees (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users);",
            USERS
        ));
        assert!(check_foreign_keys(&conn, &FOREIGN_KEYS[..1]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_table_and_missing_key() {
        let conn = store_with(&format!(
            "{} CREATE TABLE employees (id INTEGER PRIMARY KEY, user_id INTEGER);",
            USERS
        ));
        let drift = check_foreign_keys(&conn, &FOREIGN_KEYS[..2]).unwrap();
        assert_eq!(drift.len(), 2);
        assert!(drift[0].reason.contains("employees.user_id has no foreign key"));
        assert!(drift[1].reason.contains("table evaluations does not exist"));
    }

    #[test]
    fn test_wrong_reference() {
        let conn = store_with(&format!(
            "{} CREATE TABLE teams (id INTEGER PRIMARY KEY);
             CREATE TABLE employees (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES teams(id));",
            USERS
        ));
        let drift = check_foreign_keys(&conn, &FOREIGN_KEYS[..1]).unwrap();
        assert_eq!(drift.len(), 1);
        assert!(drift[0].reason.contains("references teams.id"));
    }

    #[test]
    fn test_fingerprint_tracks_schema_not_data() {
        let conn = store_with(USERS);
        let before = schema_fingerprint(&conn, &[]).unwrap();
        assert_eq!(before.len(), 64);

        conn.execute("INSERT INTO users (username) VALUES ('alice')", []).unwrap();
        assert_eq!(schema_fingerprint(&conn, &[]).unwrap(), before);

        conn.execute_batch("CREATE INDEX idx_users_username ON users(username);")
            .unwrap();
        assert_ne!(schema_fingerprint(&conn, &[]).unwrap(), before);
    }

    #[test]
    fn test_fingerprint_excludes_tables() {
        let conn = store_with(USERS);
        let before = schema_fingerprint(&conn, &["schema_migrations"]).unwrap();

        conn.execute_batch("CREATE TABLE schema_migrations (version TEXT);")
            .unwrap();
        assert_eq!(
            schema_fingerprint(&conn, &["schema_migrations"]).unwrap(),
            before
        );
    }
}
