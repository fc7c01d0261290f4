#![allow(clippy::unwrap_used, clippy::expect_used)]

use handytrack_core::errors::{ExError, ExErrorKind, MigrationError};
use handytrack_core::logging_facility::test_capture::init_test_capture;
use handytrack_core::{log_op_end, log_op_error, log_op_start};
use handytrack_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_DURATION_MS, FIELD_ERR_CODE, FIELD_ERR_KIND,
    FIELD_OP, FIELD_VERSION,
};

#[test]
fn test_log_op_start_with_fields() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, version = "9.9.1");

    let starts: Vec<_> = capture
        .events_with(FIELD_OP, op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_START))
        .collect();

    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].field(FIELD_VERSION), Some("9.9.1"));
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42u64);

    let ends = capture.events_with(FIELD_OP, op_name);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].event.as_deref(), Some(EVENT_END));
    assert_eq!(ends[0].field(FIELD_DURATION_MS), Some("42"));
}

#[test]
fn test_log_op_error_includes_code_and_message() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = MigrationError::MigrationExecution {
        version: "9.9.3".to_string(),
        description: "Add evaluations".to_string(),
        reason: "near \"(\": syntax error".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10u64);

    let errors = capture.events_with(FIELD_OP, op_name);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].event.as_deref(), Some(EVENT_END_ERROR));
    assert_eq!(errors[0].field(FIELD_ERR_CODE), Some("ERR_MIGRATION_FAILED"));
    assert_eq!(errors[0].field(FIELD_ERR_KIND), Some("MigrationFailed"));
    assert_eq!(
        errors[0].field("err_message"),
        Some("near \"(\": syntax error")
    );
}

#[test]
fn test_log_op_error_accepts_ex_error() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_4";

    let err = ExError::new(ExErrorKind::StoreUnavailable).with_message("unable to open database");
    log_op_error!(op_name, err, duration_ms = 0u64, version = "none");

    capture.assert_event_exists(op_name, EVENT_END_ERROR);
    assert_eq!(
        capture.count_events(|e| e.op.as_deref() == Some(op_name)
            && e.field(FIELD_ERR_CODE) == Some("ERR_STORE_UNAVAILABLE")),
        1
    );
}
