//! Unit tests for log.rs
//!
//! Tests LogSeverity ordering, LogEntry formatting and DefaultLogger filtering.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use std::time::SystemTime;

// ============================================================================
// Helper Functions
// ============================================================================

fn entry(severity: LogSeverity, message: &str) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "galaxy3d::Scene".to_string(),
        message: message.to_string(),
        file: None,
        line: None,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_have_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Warn.label(), "WARN ");
}

// ============================================================================
// FORMAT TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Info, "Scene created"));
    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[galaxy3d::Scene]"));
    assert!(line.ends_with("Scene created"));
}

#[test]
fn test_format_plain_with_location() {
    let mut e = entry(LogSeverity::Error, "Active camera not set");
    e.file = Some("scene_render.rs");
    e.line = Some(88);
    let line = DefaultLogger::format_plain(&e);
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("Active camera not set (scene_render.rs:88)"));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_prints_all_severities() {
    let logger = DefaultLogger::with_min_severity(LogSeverity::Trace);
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, "message"));
    }
}

#[test]
fn test_default_logger_default_threshold() {
    let logger = DefaultLogger::default();
    assert_eq!(logger.min_severity, LogSeverity::Debug);
    // Below threshold: silently dropped
    logger.log(&entry(LogSeverity::Trace, "dropped"));
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// CUSTOM LOGGER TESTS
// ============================================================================

struct CountingLogger {
    count: std::sync::Mutex<usize>,
}

impl Logger for CountingLogger {
    fn log(&self, _entry: &LogEntry) {
        *self.count.lock().unwrap() += 1;
    }
}

#[test]
fn test_custom_logger_implementation() {
    let logger = CountingLogger { count: std::sync::Mutex::new(0) };
    logger.log(&entry(LogSeverity::Warn, "one"));
    logger.log(&entry(LogSeverity::Warn, "two"));
    assert_eq!(*logger.count.lock().unwrap(), 2);
}
