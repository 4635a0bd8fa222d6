//! Tests for `src/logging.rs`.

use pearl::logging::LoggingGuard;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_file_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("nested").join("logs");
    assert!(!logs_dir.exists());

    // The global subscriber can only be installed once per process, so
    // only the directory side effect is asserted.
    let _result = pearl::logging::init_file(&logs_dir, "info");
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_console_twice_is_harmless() {
    pearl::logging::init_console("debug");
    pearl::logging::init_console("info");
    tracing::info!("still logging");
}
