//! Log record envelope and its builder

use super::context::{SPAN_ID_KEY, TRACE_ID_KEY};
use super::log_level::LogLevel;
use super::metadata::{FieldValue, Fields, Metadata};
use super::sanitizer::Sanitizer;
use chrono::{DateTime, Local};
use std::sync::Arc;

/// ISO-8601 with millisecond precision and timezone offset
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Keys owned by the envelope; metadata cannot override them in the machine form
pub const RESERVED_KEYS: &[&str] = &[
    "timestamp",
    "level",
    "message",
    "service",
    "environment",
    "version",
    "context",
];

/// Process-wide constants stamped on every record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub service: String,
    pub environment: String,
    pub version: String,
}

impl ServiceInfo {
    pub fn new(
        service: impl Into<String>,
        environment: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            environment: environment.into(),
            version: version.into(),
        }
    }

    /// `production` and `prod` (any case) are production-like
    pub fn is_production(&self) -> bool {
        is_production_env(&self.environment)
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self::new("app", "development", "1.0.0")
    }
}

pub(crate) fn is_production_env(environment: &str) -> bool {
    let env = environment.trim();
    env.eq_ignore_ascii_case("production") || env.eq_ignore_ascii_case("prod")
}

/// An enriched, sanitized log record
///
/// Built once per log call and never mutated afterwards; sinks receive it
/// behind an `Arc` and only read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    level: LogLevel,
    message: String,
    service: Arc<ServiceInfo>,
    context: Option<Fields>,
    metadata: Fields,
}

impl LogRecord {
    pub fn timestamp(&self) -> &DateTime<Local> {
        &self.timestamp
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn service(&self) -> &str {
        &self.service.service
    }

    pub fn environment(&self) -> &str {
        &self.service.environment
    }

    pub fn version(&self) -> &str {
        &self.service.version
    }

    /// Copy of the logger context at build time; `None` when it was empty
    pub fn context(&self) -> Option<&Fields> {
        self.context.as_ref()
    }

    /// Sanitized call-site metadata
    pub fn metadata(&self) -> &Fields {
        &self.metadata
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.metadata.get(TRACE_ID_KEY).and_then(FieldValue::as_str)
    }

    pub fn span_id(&self) -> Option<&str> {
        self.metadata.get(SPAN_ID_KEY).and_then(FieldValue::as_str)
    }
}

/// Assembles records from call-site input and logger context
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    service: Arc<ServiceInfo>,
    sanitizer: Sanitizer,
}

impl RecordBuilder {
    pub fn new(service: ServiceInfo) -> Self {
        Self {
            service: Arc::new(service),
            sanitizer: Sanitizer::new(),
        }
    }

    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn service(&self) -> &ServiceInfo {
        &self.service
    }

    /// Build a record stamped with the current local time
    pub fn build(
        &self,
        level: LogLevel,
        message: &str,
        metadata: Metadata,
        context: &Fields,
    ) -> LogRecord {
        self.build_at(Local::now(), level, message, metadata, context)
    }

    pub fn build_at(
        &self,
        timestamp: DateTime<Local>,
        level: LogLevel,
        message: &str,
        mut metadata: Metadata,
        context: &Fields,
    ) -> LogRecord {
        for key in [TRACE_ID_KEY, SPAN_ID_KEY] {
            if let Some(value) = context.get(key) {
                metadata.add_field_if_absent(key, value.clone());
            }
        }

        let context = if context.is_empty() {
            None
        } else {
            Some(self.sanitizer.sanitize_fields(context))
        };

        LogRecord {
            timestamp,
            level,
            message: sanitize_message(message),
            service: Arc::clone(&self.service),
            context,
            metadata: self.sanitizer.sanitize_fields(metadata.fields()),
        }
    }
}

/// Escape line breaks and tabs so one call always produces one line
fn sanitize_message(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Structured description of an error value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub name: String,
    pub message: String,
    pub stack: String,
    pub code: Option<String>,
}

impl ErrorDetails {
    /// Capture name, message, cause chain and a backtrace from an error
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let name = short_type_name(std::any::type_name::<E>());
        let message = err.to_string();

        let mut stack = format!("{}: {}", name, message);
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str(&format!("\n    caused by: {}", cause));
            source = cause.source();
        }
        let backtrace = std::backtrace::Backtrace::force_capture();
        stack.push('\n');
        stack.push_str(&backtrace.to_string());

        let as_dyn: &(dyn std::error::Error + 'static) = err;
        let code = as_dyn
            .downcast_ref::<std::io::Error>()
            .map(|io| format!("{:?}", io.kind()));

        Self {
            name,
            message,
            stack,
            code,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn to_metadata(&self) -> Metadata {
        let mut meta = Metadata::new()
            .with_field("name", self.name.as_str())
            .with_field("message", self.message.as_str())
            .with_field("stack", self.stack.as_str());
        if let Some(code) = &self.code {
            meta.add_field("code", code.as_str());
        }
        meta
    }
}

/// `std::io::error::Error` -> `Error`, `my_app::DbError<T>` -> `DbError<T>`
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    let generics = &full[base.len()..];
    format!("{}{}", short, generics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RecordBuilder {
        RecordBuilder::new(ServiceInfo::new("orders", "staging", "2.3.1"))
    }

    #[test]
    fn test_envelope_complete_without_metadata() {
        let record = builder().build(LogLevel::Info, "hello", Metadata::new(), &Fields::new());

        assert!(!record.timestamp_string().is_empty());
        assert_eq!(record.level(), LogLevel::Info);
        assert_eq!(record.message(), "hello");
        assert_eq!(record.service(), "orders");
        assert_eq!(record.environment(), "staging");
        assert_eq!(record.version(), "2.3.1");
        assert!(record.context().is_none());
        assert!(record.metadata().is_empty());
    }

    #[test]
    fn test_timestamp_has_millis_and_offset() {
        let record = builder().build(LogLevel::Info, "x", Metadata::new(), &Fields::new());
        let ts = record.timestamp_string();
        // 2025-01-08T10:30:45.123+01:00
        assert_eq!(ts.len(), 29, "unexpected timestamp {}", ts);
        assert_eq!(&ts[19..20], ".");
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_injects_trace_and_span_from_context() {
        let mut context = Fields::new();
        context.insert(TRACE_ID_KEY.into(), "trace-1".into());
        context.insert(SPAN_ID_KEY.into(), "span-1".into());
        context.insert("userId".into(), "u1".into());

        let record = builder().build(LogLevel::Info, "x", Metadata::new(), &context);
        assert_eq!(record.trace_id(), Some("trace-1"));
        assert_eq!(record.span_id(), Some("span-1"));
        assert_eq!(record.context(), Some(&context));
        assert!(record.metadata().get("userId").is_none());
    }

    #[test]
    fn test_call_site_trace_id_wins() {
        let mut context = Fields::new();
        context.insert(TRACE_ID_KEY.into(), "from-context".into());

        let meta = Metadata::new().with_field(TRACE_ID_KEY, "from-call");
        let record = builder().build(LogLevel::Info, "x", meta, &context);
        assert_eq!(record.trace_id(), Some("from-call"));
    }

    #[test]
    fn test_metadata_and_context_are_sanitized() {
        let mut context = Fields::new();
        context.insert("token".into(), "ctx-secret".into());
        let meta = Metadata::new().with_field("password", "hunter2");

        let record = builder().build(LogLevel::Info, "x", meta, &context);
        assert_eq!(record.metadata().get("password"), Some(&FieldValue::from("[REDACTED]")));
        assert_eq!(
            record.context().and_then(|c| c.get("token")),
            Some(&FieldValue::from("[REDACTED]"))
        );
    }

    #[test]
    fn test_message_injection_escaped() {
        let record = builder().build(
            LogLevel::Info,
            "login\nERROR fake entry",
            Metadata::new(),
            &Fields::new(),
        );
        assert_eq!(record.message(), "login\\nERROR fake entry");
    }

    #[test]
    fn test_error_details_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        let details = ErrorDetails::from_error(&err);
        assert_eq!(details.name, "Error");
        assert_eq!(details.message, "timeout");
        assert!(!details.stack.is_empty());
        assert_eq!(details.code.as_deref(), Some("TimedOut"));
    }

    #[test]
    fn test_error_details_without_code() {
        let err = "abc".parse::<i32>().unwrap_err();
        let details = ErrorDetails::from_error(&err);
        assert_eq!(details.name, "ParseIntError");
        assert!(details.code.is_none());
        assert!(!details.to_metadata().contains_key("code"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("app::DbError<app::Conn>"), "DbError<app::Conn>");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_is_production_env() {
        assert!(is_production_env("production"));
        assert!(is_production_env("PROD"));
        assert!(!is_production_env("staging"));
    }
}
