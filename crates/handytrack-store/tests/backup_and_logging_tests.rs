// Integration tests for pre-migration backups and runner log events

use handytrack_core::logging_facility::init_test_capture;
use handytrack_core::{RunnerConfig, SchemaVersion};
use handytrack_core_types::schema::{FIELD_DESCRIPTION, FIELD_ERR_CODE, FIELD_RUN_ID, FIELD_VERSION};
use handytrack_store::migrations::catalog;
use handytrack_store::{db, MigrationDefinition, MigrationRunner};
use rusqlite::Connection;
use tempfile::TempDir;

fn v(s: &str) -> SchemaVersion {
    SchemaVersion::parse(s).unwrap()
}

#[test]
fn test_backup_taken_before_migrating() {
    // Given: An on-disk store at 1.0.0 with some data
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("handytrack.db");
    let mut conn = db::open(&path).unwrap();
    let first = catalog::definitions().into_iter().take(1).collect();
    MigrationRunner::new(&mut conn, RunnerConfig::for_store(&path), first)
        .unwrap()
        .migrate(false);
    conn.execute(
        "INSERT INTO users (username, password_hash, role) VALUES ('sam', 'x', 'owner')",
        [],
    )
    .unwrap();

    // When: We migrate with a backup into a dedicated directory
    let backups = dir.path().join("backups");
    let config = RunnerConfig::for_store(&path).with_backup_dir(&backups);
    let result = MigrationRunner::new(&mut conn, config, catalog::definitions())
        .unwrap()
        .migrate(true);

    // Then: The backup exists and is named after the pre-migration version
    assert!(result.success, "{}", result.message);
    let backup_path = result.backup_path.expect("backup path recorded");
    assert!(backup_path.starts_with(&backups));
    let name = backup_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("handytrack-"), "{}", name);
    assert!(name.ends_with("-1.0.0.bak.db"), "{}", name);

    // And: It holds the pre-migration schema and data
    let copy = Connection::open(&backup_path).unwrap();
    let users: i64 = copy
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 1);
    assert!(copy.prepare("SELECT 1 FROM audit_log").is_err());
}

#[test]
fn test_no_backup_when_already_current() {
    // Given: A migrated on-disk store
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("handytrack.db");
    let mut conn = db::open(&path).unwrap();
    MigrationRunner::new(&mut conn, RunnerConfig::for_store(&path), catalog::definitions())
        .unwrap()
        .migrate(false);

    // When: We migrate again asking for a backup
    let result = MigrationRunner::new(&mut conn, RunnerConfig::for_store(&path), catalog::definitions())
        .unwrap()
        .migrate(true);

    // Then: Nothing to do, so no backup
    assert!(result.success);
    assert!(result.backup_path.is_none());
    let stray: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak.db"))
        .collect();
    assert!(stray.is_empty());
}

#[test]
fn test_failed_backup_aborts_before_any_step() {
    // Given: An in-memory store with no backup directory
    let mut conn = db::open_in_memory().unwrap();
    let mut runner =
        MigrationRunner::new(&mut conn, RunnerConfig::default(), catalog::definitions()).unwrap();

    // When: We migrate with a backup
    let result = runner.migrate(true);

    // Then: The run fails with a backup error and nothing was applied
    assert!(!result.success);
    assert_eq!(result.error_code, Some("ERR_BACKUP_FAILED"));
    assert!(result.applied_versions.is_empty());
    assert_eq!(runner.current_version().unwrap(), None);
}

#[test]
fn test_retention_prunes_old_backups() {
    // Given: A backup directory keeping two backups
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shop.db");
    let backups = dir.path().join("backups");
    let mut conn = db::open(&path).unwrap();
    let config = RunnerConfig::for_store(&path)
        .with_backup_dir(&backups)
        .with_backup_retention(2);

    // When: Four migrations each run with a backup
    let all = |n: usize| catalog::definitions().into_iter().take(n).collect::<Vec<_>>();
    for n in 1..=4 {
        let result = MigrationRunner::new(&mut conn, config.clone(), all(n))
            .unwrap()
            .migrate(true);
        assert!(result.success, "{}", result.message);
        // Backup names order by millisecond timestamp
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    // Then: Only the two newest backups remain
    let mut names: Vec<String> = std::fs::read_dir(&backups)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].ends_with("-1.1.0.bak.db"), "{:?}", names);
    assert!(names[1].ends_with("-1.2.0.bak.db"), "{:?}", names);
}

#[test]
fn test_step_events_logged_with_version() {
    // Given: Test capture installed
    let capture = init_test_capture();
    let mut conn = db::open_in_memory().unwrap();
    let defs = vec![
        MigrationDefinition::sql(v("7.0.0"), "Logged step", "CREATE TABLE logged (id INTEGER);"),
        MigrationDefinition::sql(v("7.1.0"), "Logged failure", "NOT SQL;"),
    ];

    // When: We migrate and the second step fails
    let result = MigrationRunner::new(&mut conn, RunnerConfig::default(), defs)
        .unwrap()
        .migrate(false);
    let run_id = result.run_id.to_string();

    // Then: The run and each step logged start and end events under one run id
    let events = capture.events_with(FIELD_RUN_ID, &run_id);
    let has = |op: &str, event: &str| {
        events
            .iter()
            .any(|e| e.op.as_deref() == Some(op) && e.event.as_deref() == Some(event))
    };
    assert!(has("migrate", "start"));
    assert!(has("migrate", "end_error"));
    assert!(has("migration_step", "start"));
    assert!(has("migration_step", "end"));
    assert!(has("migration_step", "end_error"));

    // And: The failure carries version, description and error code
    let failure = events
        .iter()
        .find(|e| e.op.as_deref() == Some("migration_step") && e.event.as_deref() == Some("end_error"))
        .unwrap();
    assert_eq!(failure.field(FIELD_VERSION), Some("7.1.0"));
    assert_eq!(failure.field(FIELD_DESCRIPTION), Some("Logged failure"));
    assert_eq!(failure.field(FIELD_ERR_CODE), Some("ERR_MIGRATION_FAILED"));
}

#[test]
fn test_retention_keeps_returned_backup_with_neighbouring_store() {
    // Given: Two stores sharing a backup directory, one name a prefix of the other
    let dir = TempDir::new().unwrap();
    let backups = dir.path().join("backups");
    let app_path = dir.path().join("app.db");
    let staging_path = dir.path().join("app-staging.db");
    let mut app = db::open(&app_path).unwrap();
    let mut staging = db::open(&staging_path).unwrap();
    let app_config = RunnerConfig::for_store(&app_path)
        .with_backup_dir(&backups)
        .with_backup_retention(1);
    let staging_config = RunnerConfig::for_store(&staging_path).with_backup_dir(&backups);
    let first_two = || catalog::definitions().into_iter().take(2).collect::<Vec<_>>();

    // When: app.db is backed up, then app-staging.db, then app.db again
    let first = MigrationRunner::new(&mut app, app_config.clone(), first_two())
        .unwrap()
        .migrate(true);
    let other = MigrationRunner::new(&mut staging, staging_config, first_two())
        .unwrap()
        .migrate(true);
    let second = MigrationRunner::new(&mut app, app_config, catalog::definitions())
        .unwrap()
        .migrate(true);

    // Then: The backup returned by the latest run is still on disk
    assert!(second.success, "{}", second.message);
    let kept = second.backup_path.expect("backup path recorded");
    assert!(kept.exists(), "{}", kept.display());

    // And: app.db's older backup was pruned, the other store's was not
    assert!(!first.backup_path.unwrap().exists());
    assert!(other.backup_path.unwrap().exists());
}
