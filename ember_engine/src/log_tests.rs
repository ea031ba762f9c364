//! Unit tests for log.rs
//!
//! Tests LogEntry, LogSeverity and DefaultLogger formatting.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "ember::FrameLoop".to_string(),
        message: "frame skipped".to_string(),
        file,
        line,
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
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Info.label(), "INFO ");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_location() {
    assert!(!entry(LogSeverity::Info, None, None).has_location());
    assert!(!entry(LogSeverity::Error, Some("frame_loop.rs"), None).has_location());
    assert!(entry(LogSeverity::Error, Some("frame_loop.rs"), Some(88)).has_location());
}

#[test]
fn test_log_entry_clone() {
    let entry1 = entry(LogSeverity::Warn, Some("swapchain.rs"), Some(10));
    let entry2 = entry1.clone();

    assert_eq!(entry1.severity, entry2.severity);
    assert_eq!(entry1.source, entry2.source);
    assert_eq!(entry1.file, entry2.file);
    assert_eq!(entry1.line, entry2.line);
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let text = DefaultLogger::format_plain(&entry(LogSeverity::Debug, None, None));
    assert!(text.contains("[DEBUG] [ember::FrameLoop] frame skipped"));
    assert!(!text.contains("("));
}

#[test]
fn test_format_plain_with_location() {
    let text = DefaultLogger::format_plain(&entry(LogSeverity::Error, Some("sync_ring.rs"), Some(42)));
    assert!(text.ends_with("frame skipped (sync_ring.rs:42)"));
    assert!(text.contains("[ERROR]"));
}

#[test]
fn test_format_plain_timestamp_prefix() {
    let text = DefaultLogger::format_plain(&entry(LogSeverity::Info, None, None));
    // [YYYY-MM-DD HH:MM:SS.mmm]
    assert_eq!(text.find(']'), Some(24));
}

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("log_tests.rs"), Some(1)));
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}
