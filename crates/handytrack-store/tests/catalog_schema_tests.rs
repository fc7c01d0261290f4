// Integration tests for the built-in catalog against a real store file
// Covers declared foreign keys, category normalization and schema drift

use handytrack_core::RunnerConfig;
use handytrack_store::db;
use handytrack_store::migrations::catalog;
use handytrack_store::schema_check::{check_foreign_keys, FOREIGN_KEYS};
use handytrack_store::MigrationRunner;
use tempfile::TempDir;

#[test]
fn test_declared_foreign_keys_present_after_migrate() {
    // Given: A fresh on-disk store
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("handytrack.db");
    let mut conn = db::open(&path).unwrap();

    // When: We apply the whole catalog
    let result = MigrationRunner::new(&mut conn, RunnerConfig::for_store(&path), catalog::definitions())
        .unwrap()
        .migrate(false);
    assert!(result.success, "{}", result.message);

    // Then: Every declared foreign key matches the live schema
    let drift = check_foreign_keys(&conn, FOREIGN_KEYS).unwrap();
    assert!(drift.is_empty(), "{:?}", drift);
}

#[test]
fn test_partial_catalog_reports_missing_tables() {
    // Given: A store at 1.0.0 only
    let mut conn = db::open_in_memory().unwrap();
    let first = catalog::definitions().into_iter().take(1).collect();
    MigrationRunner::new(&mut conn, RunnerConfig::default(), first)
        .unwrap()
        .migrate(false);

    // When: We check the full declaration
    let drift = check_foreign_keys(&conn, FOREIGN_KEYS).unwrap();

    // Then: The tables from 1.1.0 and 1.3.0 are reported missing
    let missing: Vec<&str> = drift.iter().map(|d| d.declared.table).collect();
    assert_eq!(
        missing,
        vec!["evaluation_skills", "evaluation_skills", "evaluation_tools", "evaluation_tools", "audit_log"]
    );
}

#[test]
fn test_category_normalization_rewrites_rows() {
    // Given: A store at 1.3.0 holding unnormalized categories
    let mut conn = db::open_in_memory().unwrap();
    let upto_audit = catalog::definitions().into_iter().take(4).collect();
    MigrationRunner::new(&mut conn, RunnerConfig::default(), upto_audit)
        .unwrap()
        .migrate(false);
    conn.execute_batch(
        "INSERT INTO skills (name, category) VALUES ('Drywall patching', '  Carpentry ');
         INSERT INTO tools (name, category) VALUES ('Stud finder', 'MEASURING');",
    )
    .unwrap();

    // When: We apply the rest of the catalog
    let result = MigrationRunner::new(&mut conn, RunnerConfig::default(), catalog::definitions())
        .unwrap()
        .migrate(false);

    // Then: Only 1.4.0 ran and the categories are normalized
    assert_eq!(result.applied_versions, vec![catalog::latest_version()]);
    let skill: String = conn
        .query_row("SELECT category FROM skills", [], |row| row.get(0))
        .unwrap();
    let tool: String = conn
        .query_row("SELECT category FROM tools", [], |row| row.get(0))
        .unwrap();
    assert_eq!(skill, "carpentry");
    assert_eq!(tool, "measuring");
}

#[test]
fn test_foreign_keys_enforced_on_opened_store() {
    // Given: A migrated store opened through db::open
    let mut conn = db::open_in_memory().unwrap();
    MigrationRunner::new(&mut conn, RunnerConfig::default(), catalog::definitions())
        .unwrap()
        .migrate(false);

    // When: We insert an evaluation for an employee that doesn't exist
    let insert = conn.execute(
        "INSERT INTO evaluations (employee_id, evaluator_id, evaluation_date) VALUES (42, 42, '2026-01-05')",
        [],
    );

    // Then: The foreign key rejects it
    assert!(insert.is_err());
}
