//! Built-in HandyTrack schema migrations
//!
//! The tracker's own definition list, oldest first. Released versions are
//! never edited; schema changes go in a new definition at the end.

use super::definition::MigrationDefinition;
use handytrack_core::SchemaVersion;

const INITIAL_SCHEMA: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('admin', 'manager', 'owner', 'employee')),
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE employees (
    id INTEGER PRIMARY KEY,
    user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    name TEXT NOT NULL,
    position TEXT,
    hire_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE skills (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL,
    description TEXT
);

CREATE TABLE tools (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL,
    description TEXT
);

CREATE TABLE evaluations (
    id INTEGER PRIMARY KEY,
    employee_id INTEGER NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
    evaluator_id INTEGER NOT NULL REFERENCES users(id),
    evaluation_date TEXT NOT NULL,
    overall_rating INTEGER CHECK (overall_rating BETWEEN 1 AND 5),
    comments TEXT
);
"#;

const DROP_INITIAL_SCHEMA: &str = r#"
DROP TABLE evaluations;
DROP TABLE tools;
DROP TABLE skills;
DROP TABLE employees;
DROP TABLE users;
"#;

const EVALUATION_DETAILS: &str = r#"
CREATE TABLE evaluation_skills (
    id INTEGER PRIMARY KEY,
    evaluation_id INTEGER NOT NULL REFERENCES evaluations(id) ON DELETE CASCADE,
    skill_id INTEGER NOT NULL REFERENCES skills(id),
    proficiency INTEGER NOT NULL CHECK (proficiency BETWEEN 1 AND 5),
    notes TEXT,
    UNIQUE (evaluation_id, skill_id)
);

CREATE TABLE evaluation_tools (
    id INTEGER PRIMARY KEY,
    evaluation_id INTEGER NOT NULL REFERENCES evaluations(id) ON DELETE CASCADE,
    tool_id INTEGER NOT NULL REFERENCES tools(id),
    proficiency INTEGER NOT NULL CHECK (proficiency BETWEEN 1 AND 5),
    notes TEXT,
    UNIQUE (evaluation_id, tool_id)
);
"#;

const DASHBOARD_INDEXES: &str = r#"
CREATE INDEX idx_evaluations_employee ON evaluations(employee_id);
CREATE INDEX idx_evaluations_date ON evaluations(evaluation_date);
CREATE INDEX idx_evaluation_skills_skill ON evaluation_skills(skill_id);
CREATE INDEX idx_evaluation_tools_tool ON evaluation_tools(tool_id);
CREATE INDEX idx_employees_active ON employees(is_active);
"#;

const DROP_DASHBOARD_INDEXES: &str = r#"
DROP INDEX idx_employees_active;
DROP INDEX idx_evaluation_tools_tool;
DROP INDEX idx_evaluation_skills_skill;
DROP INDEX idx_evaluations_date;
DROP INDEX idx_evaluations_employee;
"#;

const AUDIT_LOG: &str = r#"
CREATE TABLE audit_log (
    id INTEGER PRIMARY KEY,
    user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id INTEGER,
    details TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX idx_audit_log_entity ON audit_log(entity, entity_id);
"#;

const DROP_AUDIT_LOG: &str = r#"
DROP INDEX idx_audit_log_entity;
DROP TABLE audit_log;
"#;

// Data-only change; the previous spellings are not kept, so it has no downgrade.
const NORMALIZE_CATEGORIES: &str = r#"
UPDATE skills SET category = lower(trim(category));
UPDATE tools SET category = lower(trim(category));
"#;

/// The tracker's migrations, ascending by version
pub fn definitions() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::sql(SchemaVersion::new(1, 0, 0), "Initial schema", INITIAL_SCHEMA)
            .with_downgrade_sql(DROP_INITIAL_SCHEMA),
        MigrationDefinition::sql(
            SchemaVersion::new(1, 1, 0),
            "Per-skill and per-tool evaluation details",
            EVALUATION_DETAILS,
        )
        .with_downgrade_sql("DROP TABLE evaluation_tools;\nDROP TABLE evaluation_skills;"),
        MigrationDefinition::sql(
            SchemaVersion::new(1, 2, 0),
            "Dashboard indexes",
            DASHBOARD_INDEXES,
        )
        .with_downgrade_sql(DROP_DASHBOARD_INDEXES),
        MigrationDefinition::sql(SchemaVersion::new(1, 3, 0), "Audit log", AUDIT_LOG)
            .with_downgrade_sql(DROP_AUDIT_LOG),
        MigrationDefinition::sql(
            SchemaVersion::new(1, 4, 0),
            "Normalize skill and tool categories",
            NORMALIZE_CATEGORIES,
        ),
    ]
}

/// Version the catalog brings a store to
pub fn latest_version() -> SchemaVersion {
    SchemaVersion::new(1, 4, 0)
}
