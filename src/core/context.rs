//! Per-logger correlation context
//!
//! `LoggerContext` stores fields (trace id, span id, user id, request id, ...)
//! that are attached to every record emitted through one `Logger`. Each
//! logger owns its context exclusively: cloning produces an independent deep
//! copy, and every read hands out a copy, so no caller can reach the internal
//! state through a returned value.

use super::metadata::{FieldValue, Fields, Metadata};
use parking_lot::RwLock;
use uuid::Uuid;

/// Context key holding the trace id
pub const TRACE_ID_KEY: &str = "traceId";

/// Context key holding the span id
pub const SPAN_ID_KEY: &str = "spanId";

/// Generate a fresh, globally unique trace id (UUID v4)
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a fresh, globally unique span id (UUID v4)
pub fn generate_span_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logger-owned context fields
///
/// # Example
///
/// ```
/// use structured_logger::{meta, LoggerContext};
///
/// let ctx = LoggerContext::new();
/// ctx.set(meta! { "service_region" => "eu-west-1" });
///
/// let derived = ctx.derive(meta! { "userId" => "u1" });
/// ctx.clear();
///
/// assert!(ctx.is_empty());
/// assert_eq!(derived.len(), 2);
/// ```
#[derive(Default)]
pub struct LoggerContext {
    fields: RwLock<Fields>,
}

// Values may hold secrets that have not been through the sanitizer yet
impl std::fmt::Debug for LoggerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.fields.read().keys()).finish()
    }
}

impl LoggerContext {
    pub fn new() -> Self {
        Self {
            fields: RwLock::new(Fields::new()),
        }
    }

    /// Shallow-merge `partial` into the context; existing keys are overwritten
    pub fn set(&self, partial: Metadata) {
        self.fields.write().extend(partial.into_fields());
    }

    /// Set a single field
    pub fn insert<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.write().insert(key.into(), value.into());
    }

    /// Remove a field from the context
    pub fn remove(&self, key: &str) {
        self.fields.write().remove(key);
    }

    /// Reset the context to empty
    pub fn clear(&self) {
        self.fields.write().clear();
    }

    /// Get a copy of all fields
    pub fn snapshot(&self) -> Fields {
        self.fields.read().clone()
    }

    pub fn get(&self, key: &str) -> Option<FieldValue> {
        self.fields.read().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    /// Build an independent context equal to `self ∪ additional`,
    /// with `additional` winning key conflicts
    pub fn derive(&self, additional: Metadata) -> Self {
        let mut fields = self.snapshot();
        fields.extend(additional.into_fields());
        Self {
            fields: RwLock::new(fields),
        }
    }

    /// Store a trace id (given or fresh) and always a fresh span id
    ///
    /// Returns the trace id in effect.
    pub fn start_trace(&self, existing_id: Option<&str>) -> String {
        let trace_id = existing_id
            .map(str::to_string)
            .unwrap_or_else(generate_trace_id);
        let span_id = generate_span_id();

        let mut fields = self.fields.write();
        fields.insert(TRACE_ID_KEY.to_string(), FieldValue::String(trace_id.clone()));
        fields.insert(SPAN_ID_KEY.to_string(), FieldValue::String(span_id));
        trace_id
    }
}

impl Clone for LoggerContext {
    /// Deep copy; the clone shares nothing with the original
    fn clone(&self) -> Self {
        Self {
            fields: RwLock::new(self.snapshot()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_merges_and_overwrites() {
        let ctx = LoggerContext::new();
        ctx.set(Metadata::new().with_field("a", 1).with_field("b", 2));
        ctx.set(Metadata::new().with_field("b", 3).with_field("c", 4));

        let fields = ctx.snapshot();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("b"), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let ctx = LoggerContext::new();
        ctx.insert("key", "value");

        let mut copy = ctx.snapshot();
        copy.insert("other".to_string(), FieldValue::Null);
        copy.remove("key");

        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("key"), Some(FieldValue::from("value")));
    }

    #[test]
    fn test_debug_prints_keys_only() {
        let ctx = LoggerContext::new();
        ctx.insert("apiKey", "sk-live-123");
        ctx.insert("userId", "u1");

        let printed = format!("{:?}", ctx);
        assert!(printed.contains("apiKey"));
        assert!(printed.contains("userId"));
        assert!(!printed.contains("sk-live-123"));
        assert!(!printed.contains("u1\""));
    }

    #[test]
    fn test_derive_is_independent() {
        let parent = LoggerContext::new();
        parent.insert(TRACE_ID_KEY, "t1");

        let child = parent.derive(Metadata::new().with_field("userId", "u1"));
        parent.insert("extra", "x");
        child.insert("jobId", "j1");

        assert_eq!(parent.len(), 2);
        assert!(parent.get("jobId").is_none());
        assert_eq!(child.len(), 3);
        assert!(child.get("extra").is_none());
    }

    #[test]
    fn test_derive_additional_wins() {
        let parent = LoggerContext::new();
        parent.insert("userId", "parent");

        let child = parent.derive(Metadata::new().with_field("userId", "child"));
        assert_eq!(child.get("userId"), Some(FieldValue::from("child")));
        assert_eq!(parent.get("userId"), Some(FieldValue::from("parent")));
    }

    #[test]
    fn test_start_trace() {
        let ctx = LoggerContext::new();

        let first = ctx.start_trace(None);
        let first_span = ctx.get(SPAN_ID_KEY);
        assert!(!first.is_empty());

        let fixed = ctx.start_trace(Some("fixed-id"));
        assert_eq!(fixed, "fixed-id");
        assert_eq!(ctx.get(TRACE_ID_KEY), Some(FieldValue::from("fixed-id")));
        assert_ne!(ctx.get(SPAN_ID_KEY), first_span);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_trace_id();
        let b = generate_trace_id();
        assert_ne!(a, b);
        assert_ne!(generate_span_id(), generate_span_id());
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_clear() {
        let ctx = LoggerContext::new();
        ctx.insert("key1", "value1");
        ctx.clear();
        assert!(ctx.is_empty());
    }
}
