//! Integration tests for the logger
//!
//! These tests verify:
//! - Log injection prevention
//! - Configured sink set and per-sink minimum levels
//! - Redaction of persisted records
//! - Context propagation into child loggers
//! - Sink failure isolation
//! - Console gating by environment

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use structured_logger::appenders::{Retention, RotatingFileAppender, RotationPolicy, RotationStrategy};
use structured_logger::prelude::*;
use structured_logger::REDACTED;
use tempfile::TempDir;

fn config_for(dir: &Path, environment: &str) -> LoggingConfig {
    LoggingConfig {
        dir: dir.to_path_buf(),
        environment: environment.to_string(),
        service: "orders".to_string(),
        version: "3.2.1".to_string(),
        ..LoggingConfig::default()
    }
}

fn read_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is one JSON record"))
        .collect()
}

fn file_logger(dir: &Path) -> Logger {
    let appender = RotatingFileAppender::with_policy(
        dir.join("app.log"),
        RotationPolicy::new()
            .with_strategy(RotationStrategy::Never)
            .with_retention(Retention::Unlimited),
    )
    .expect("Failed to create appender");

    Logger::builder()
        .min_level(LogLevel::Debug)
        .service(ServiceInfo::new("api", "test", "1.0.0"))
        .transport(SinkKind::General, LogLevel::Silly, appender)
        .build()
        .expect("Failed to build logger")
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = file_logger(temp_dir.path());

    let malicious_message = "User login\n{\"level\":\"error\",\"message\":\"Fake\"}\r\n\tContinuation";
    logger.info(malicious_message);
    logger.flush().expect("Failed to flush");

    let content = fs::read_to_string(temp_dir.path().join("app-current.log")).unwrap();
    assert_eq!(content.lines().count(), 1, "Log should be a single line");

    let records = read_lines(&temp_dir.path().join("app-current.log"));
    assert_eq!(
        records[0]["message"],
        "User login\\n{\"level\":\"error\",\"message\":\"Fake\"}\\r\\n\\tContinuation"
    );
}

#[test]
fn test_envelope_completeness() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = file_logger(temp_dir.path());

    logger.info("no metadata");
    logger.flush().unwrap();

    let records = read_lines(&temp_dir.path().join("app-current.log"));
    for key in ["timestamp", "level", "message", "service", "environment", "version"] {
        let value = records[0][key].as_str().unwrap_or_default();
        assert!(!value.is_empty(), "{} must be present", key);
    }
    assert!(records[0].get("context").is_none());
}

#[test]
fn test_configured_sinks_and_levels() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::from_config(&config_for(temp_dir.path(), "production")).unwrap();

    logger.debug("below production minimum");
    logger.info("order placed");
    logger.warn_with("slow payment", meta! { "ms" => 1200 });
    logger.error("payment failed");
    logger.flush().unwrap();

    let general = read_lines(&temp_dir.path().join("application-current.log"));
    let messages: Vec<&str> = general.iter().filter_map(|r| r["message"].as_str()).collect();
    assert_eq!(messages, vec!["order placed", "slow payment", "payment failed"]);
    assert_eq!(general[0]["service"], "orders");
    assert_eq!(general[0]["environment"], "production");
    assert_eq!(general[0]["version"], "3.2.1");
    assert_eq!(general[1]["ms"], 1200);

    let errors = read_lines(&temp_dir.path().join("error-current.log"));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["level"], "error");

    assert!(read_lines(&temp_dir.path().join("exceptions-current.log")).is_empty());
    assert!(read_lines(&temp_dir.path().join("rejections-current.log")).is_empty());

    assert!(logger.shutdown(std::time::Duration::from_secs(5)));
}

#[test]
fn test_redaction_in_persisted_records() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = file_logger(temp_dir.path());

    logger.set_context(meta! { "apiKey" => "ctx-secret-key" });
    logger.info_with(
        "User created",
        meta! {
            "user" => meta! {
                "name" => "alice",
                "Password" => "hunter2",
                "cards" => vec![meta! { "creditCard" => "4111111111111111" }],
            },
            "authorization" => "Bearer abc.def",
        },
    );
    logger.flush().unwrap();

    let content = fs::read_to_string(temp_dir.path().join("app-current.log")).unwrap();
    for secret in ["hunter2", "4111111111111111", "Bearer abc.def", "ctx-secret-key"] {
        assert!(!content.contains(secret), "{} leaked", secret);
    }

    let records = read_lines(&temp_dir.path().join("app-current.log"));
    assert_eq!(records[0]["user"]["Password"], REDACTED);
    assert_eq!(records[0]["user"]["name"], "alice");
    assert_eq!(records[0]["user"]["cards"][0]["creditCard"], REDACTED);
    assert_eq!(records[0]["authorization"], REDACTED);
    assert_eq!(records[0]["context"]["apiKey"], REDACTED);
}

#[test]
fn test_child_context_in_records() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = file_logger(temp_dir.path());

    let request = logger.child(meta! { "requestId" => "r-1" });
    let trace_id = request.start_trace(None);
    request.info("handled");
    logger.info("background");
    logger.flush().unwrap();

    let records = read_lines(&temp_dir.path().join("app-current.log"));
    assert_eq!(records[0]["context"]["requestId"], "r-1");
    assert_eq!(records[0]["traceId"], trace_id.as_str());
    assert!(records[0]["spanId"].as_str().is_some());
    assert!(records[1].get("context").is_none());
    assert!(records[1].get("traceId").is_none());
}

struct BrokenDisk {
    attempts: Arc<AtomicUsize>,
}

impl Appender for BrokenDisk {
    fn append(&mut self, _record: &LogRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(LoggerError::writer("No space left on device"))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "broken-disk"
    }
}

#[test]
fn test_sink_failure_isolated() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let attempts = Arc::new(AtomicUsize::new(0));
    let healthy = RotatingFileAppender::with_policy(
        temp_dir.path().join("healthy.log"),
        RotationPolicy::new().with_strategy(RotationStrategy::Never),
    )
    .unwrap();

    let logger = Logger::builder()
        .transport(
            SinkKind::General,
            LogLevel::Silly,
            BrokenDisk {
                attempts: Arc::clone(&attempts),
            },
        )
        .transport(SinkKind::Error, LogLevel::Silly, healthy)
        .async_mode(64)
        .build()
        .unwrap();

    for i in 0..10 {
        logger.info(format!("record {}", i));
    }
    logger.flush().unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 10);
    assert_eq!(logger.metrics().sink_failures(), 10);
    assert_eq!(
        read_lines(&temp_dir.path().join("healthy-current.log")).len(),
        10
    );
}

#[test]
fn test_console_gating() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let development = Logger::from_config(&config_for(temp_dir.path(), "development")).unwrap();
    assert!(development.sink_kinds().contains(&SinkKind::Console));

    let production = Logger::from_config(&config_for(temp_dir.path(), "prod")).unwrap();
    assert!(!production.sink_kinds().contains(&SinkKind::Console));

    let forced = Logger::from_config(&LoggingConfig {
        console: Some(true),
        ..config_for(temp_dir.path(), "production")
    })
    .unwrap();
    assert!(forced.sink_kinds().contains(&SinkKind::Console));
}

#[test]
fn test_unhandled_rejection_sink() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::from_config(&config_for(temp_dir.path(), "production")).unwrap();

    let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "upstream closed");
    logger.unhandled_rejection(&err);
    logger.flush().unwrap();

    let rejections = read_lines(&temp_dir.path().join("rejections-current.log"));
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0]["error"]["message"], "upstream closed");
    assert_eq!(rejections[0]["error"]["code"], "ConnectionReset");
    assert!(read_lines(&temp_dir.path().join("application-current.log")).is_empty());
}

#[test]
fn test_invalid_level_rejected_at_startup() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = LoggingConfig {
        level: Some("chatty".to_string()),
        ..config_for(temp_dir.path(), "development")
    };

    let err = Logger::from_config(&config).unwrap_err();
    assert!(matches!(err, LoggerError::InvalidLevel(_)));
}
