//! Output format configuration for log records
//!
//! Provides the two renderings every record supports:
//! - Json: machine form, one parseable object per line for append-only files
//! - Text: human form for the console, optionally colored by level

use super::context::{SPAN_ID_KEY, TRACE_ID_KEY};
use super::record::{LogRecord, RESERVED_KEYS};

/// Number of id characters shown in the human form
pub const SHORT_ID_LENGTH: usize = 8;

/// Output format for log records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format
    ///
    /// Example: `2025-01-08T10:30:45.123+00:00 [info] [trace:4bf92f35]: Request processed {...}`
    #[default]
    Text,

    /// JSON format for machine processing
    ///
    /// Example: `{"environment":"production","level":"info","message":"Request processed",...}`
    Json,
}

impl OutputFormat {
    /// Format a record according to this output format
    ///
    /// `colors` only affects the text form.
    pub fn format(&self, record: &LogRecord, colors: bool) -> String {
        match self {
            OutputFormat::Text => format_text(record, colors),
            OutputFormat::Json => format_json(record),
        }
    }
}

/// Machine form of a record as a JSON object
pub fn to_json_value(record: &LogRecord) -> serde_json::Value {
    let mut json_obj = serde_json::Map::new();

    for (key, value) in record.metadata() {
        if !RESERVED_KEYS.contains(&key.as_str()) {
            json_obj.insert(key.clone(), value.to_json_value());
        }
    }

    json_obj.insert(
        "timestamp".to_string(),
        serde_json::Value::String(record.timestamp_string()),
    );
    json_obj.insert(
        "level".to_string(),
        serde_json::Value::String(record.level().to_str().to_string()),
    );
    json_obj.insert(
        "message".to_string(),
        serde_json::Value::String(record.message().to_string()),
    );
    json_obj.insert(
        "service".to_string(),
        serde_json::Value::String(record.service().to_string()),
    );
    json_obj.insert(
        "environment".to_string(),
        serde_json::Value::String(record.environment().to_string()),
    );
    json_obj.insert(
        "version".to_string(),
        serde_json::Value::String(record.version().to_string()),
    );

    if let Some(context) = record.context() {
        json_obj.insert(
            "context".to_string(),
            serde_json::Value::Object(
                context
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
        );
    }

    serde_json::Value::Object(json_obj)
}

fn format_json(record: &LogRecord) -> String {
    // Serializing a Value built from owned strings and finite numbers cannot fail
    serde_json::to_string(&to_json_value(record)).unwrap_or_default()
}

fn format_text(record: &LogRecord, colors: bool) -> String {
    let mut line = format!(
        "{} [{}]",
        record.timestamp_string(),
        level_label(record, colors)
    );

    if let Some(trace_id) = record.trace_id() {
        line.push_str(&format!(" [trace:{}]", short_id(trace_id)));
    }
    if let Some(span_id) = record.span_id() {
        line.push_str(&format!(" [span:{}]", short_id(span_id)));
    }

    line.push_str(": ");
    line.push_str(record.message());

    let remaining: serde_json::Map<String, serde_json::Value> = record
        .metadata()
        .iter()
        .filter(|(key, _)| key.as_str() != TRACE_ID_KEY && key.as_str() != SPAN_ID_KEY)
        .map(|(k, v)| (k.clone(), v.to_json_value()))
        .collect();

    if !remaining.is_empty() {
        let pretty = serde_json::to_string_pretty(&serde_json::Value::Object(remaining))
            .unwrap_or_default();
        line.push(' ');
        line.push_str(&pretty);
    }

    line
}

#[cfg(feature = "console")]
fn level_label(record: &LogRecord, colors: bool) -> String {
    use colored::Colorize;

    let level = record.level();
    if colors {
        level.to_str().color(level.color_code()).to_string()
    } else {
        level.to_str().to_string()
    }
}

#[cfg(not(feature = "console"))]
fn level_label(record: &LogRecord, _colors: bool) -> String {
    record.level().to_str().to_string()
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LENGTH) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;
    use crate::core::metadata::{Fields, Metadata};
    use crate::core::record::{RecordBuilder, ServiceInfo};
    use chrono::{Local, TimeZone};

    fn record_with(meta: Metadata, context: &Fields) -> LogRecord {
        let timestamp = Local
            .with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime");
        RecordBuilder::new(ServiceInfo::new("api", "test", "1.0.0")).build_at(
            timestamp,
            LogLevel::Warn,
            "Validation failed",
            meta,
            context,
        )
    }

    #[test]
    fn test_json_form_fields() {
        let mut context = Fields::new();
        context.insert("requestId".into(), "r-1".into());
        let record = record_with(Metadata::new().with_field("path", "/users"), &context);

        let line = OutputFormat::Json.format(&record, false);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed["level"], "warn");
        assert_eq!(parsed["message"], "Validation failed");
        assert_eq!(parsed["service"], "api");
        assert_eq!(parsed["environment"], "test");
        assert_eq!(parsed["version"], "1.0.0");
        assert_eq!(parsed["path"], "/users");
        assert_eq!(parsed["context"]["requestId"], "r-1");
        assert!(parsed["timestamp"].as_str().unwrap().starts_with("2025-01-08T10:30:45.000"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_json_form_envelope_wins() {
        let record = record_with(
            Metadata::new()
                .with_field("level", "spoofed")
                .with_field("service", "spoofed"),
            &Fields::new(),
        );
        let parsed = to_json_value(&record);
        assert_eq!(parsed["level"], "warn");
        assert_eq!(parsed["service"], "api");
        assert!(parsed.get("context").is_none());
    }

    #[test]
    fn test_text_form_plain() {
        let record = record_with(Metadata::new(), &Fields::new());
        let line = OutputFormat::Text.format(&record, false);
        assert!(line.starts_with("2025-01-08T10:30:45.000"));
        assert!(line.ends_with(" [warn]: Validation failed"));
    }

    #[test]
    fn test_text_form_trace_tags_and_metadata() {
        let mut context = Fields::new();
        context.insert(TRACE_ID_KEY.into(), "4bf92f3577b34da6".into());
        context.insert(SPAN_ID_KEY.into(), "00f067aa0ba902b7".into());

        let record = record_with(Metadata::new().with_field("method", "POST"), &context);
        let line = OutputFormat::Text.format(&record, false);

        assert!(line.contains(" [warn] [trace:4bf92f35] [span:00f067aa]: Validation failed {"));
        assert!(line.contains("\"method\": \"POST\""));
        assert!(!line.contains("4bf92f3577b34da6"));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abcdefghijkl"), "abcdefgh");
        assert_eq!(short_id("abc"), "abc");
    }
}
