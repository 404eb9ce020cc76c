//! Recursive redaction of sensitive metadata fields
//!
//! Keys are compared case-insensitively against a fixed set of sensitive
//! names. A matching key has its value replaced by [`REDACTED`] without
//! descending into it. Mappings are recursed, sequences are mapped element by
//! element, and every other value (scalars, date-times) passes through.
//!
//! Metadata trees are owned values and cannot contain cycles, but they can be
//! arbitrarily deep. Containers nested deeper than the configured limit are
//! replaced with [`DEPTH_MARKER`].
//!
//! # Example
//!
//! ```
//! use structured_logger::{meta, Sanitizer, FieldValue};
//!
//! let sanitized = Sanitizer::new().sanitize_metadata(&meta! {
//!     "user" => "alice",
//!     "password" => "hunter2",
//! });
//!
//! assert_eq!(sanitized.get("password"), Some(&FieldValue::from("[REDACTED]")));
//! assert_eq!(sanitized.get("user"), Some(&FieldValue::from("alice")));
//! ```

use super::metadata::{FieldValue, Fields, Metadata};

/// Replacement written in place of a sensitive value
pub const REDACTED: &str = "[REDACTED]";

/// Replacement written in place of a container nested beyond the depth limit
pub const DEPTH_MARKER: &str = "[MAX_DEPTH]";

/// Default nesting limit for sanitized trees
pub const MAX_DEPTH: usize = 32;

/// Field names whose values are always redacted (compared case-insensitively)
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "secret",
    "apikey",
    "api_key",
    "api-key",
    "authorization",
    "accesstoken",
    "access_token",
    "refreshtoken",
    "refresh_token",
    "privatekey",
    "private_key",
    "clientsecret",
    "client_secret",
    "creditcard",
    "credit_card",
    "cardnumber",
    "card_number",
    "cvv",
    "ssn",
];

/// Check whether a key names a sensitive field
#[inline]
pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(key))
}

/// Produces redacted copies of metadata trees. Never mutates its input.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    max_depth: usize,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }

    /// Use a custom nesting limit (at least 1)
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sanitize an arbitrary value. Non-container values are returned unchanged.
    pub fn sanitize(&self, value: &FieldValue) -> FieldValue {
        self.sanitize_value(value, 0)
    }

    /// Sanitize a mapping of fields
    pub fn sanitize_fields(&self, fields: &Fields) -> Fields {
        self.sanitize_map(fields, 1)
    }

    pub fn sanitize_metadata(&self, metadata: &Metadata) -> Metadata {
        Metadata::from(self.sanitize_fields(metadata.fields()))
    }

    fn sanitize_value(&self, value: &FieldValue, depth: usize) -> FieldValue {
        match value {
            FieldValue::Object(fields) => {
                if depth >= self.max_depth {
                    return FieldValue::String(DEPTH_MARKER.to_string());
                }
                FieldValue::Object(self.sanitize_map(fields, depth + 1))
            }
            FieldValue::Array(items) => {
                if depth >= self.max_depth {
                    return FieldValue::String(DEPTH_MARKER.to_string());
                }
                FieldValue::Array(
                    items
                        .iter()
                        .map(|item| self.sanitize_value(item, depth + 1))
                        .collect(),
                )
            }
            other => other.clone(),
        }
    }

    fn sanitize_map(&self, fields: &Fields, depth: usize) -> Fields {
        fields
            .iter()
            .map(|(key, value)| {
                let sanitized = if is_sensitive_key(key) {
                    FieldValue::String(REDACTED.to_string())
                } else {
                    self.sanitize_value(value, depth)
                };
                (key.clone(), sanitized)
            })
            .collect()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sanitize_json(value: serde_json::Value) -> serde_json::Value {
        Sanitizer::new()
            .sanitize(&FieldValue::from(value))
            .to_json_value()
    }

    #[test]
    fn test_redacts_top_level_keys_case_insensitively() {
        let out = sanitize_json(json!({
            "Password": "a",
            "APIKEY": "b",
            "accessToken": "c",
            "username": "d",
        }));

        assert_eq!(
            out,
            json!({
                "Password": REDACTED,
                "APIKEY": REDACTED,
                "accessToken": REDACTED,
                "username": "d",
            })
        );
    }

    #[test]
    fn test_redacts_nested_keys() {
        let out = sanitize_json(json!({
            "user": {"profile": {"ssn": "123-45-6789", "name": "bob"}},
        }));
        assert_eq!(
            out,
            json!({"user": {"profile": {"ssn": REDACTED, "name": "bob"}}})
        );
    }

    #[test]
    fn test_does_not_recurse_into_redacted_value() {
        let out = sanitize_json(json!({"secret": {"inner": "value"}}));
        assert_eq!(out, json!({"secret": REDACTED}));
    }

    #[test]
    fn test_array_elements_sanitized_independently() {
        let out = sanitize_json(json!({"list": [{"password": "a"}, {"ok": "b"}]}));
        assert_eq!(out, json!({"list": [{"password": REDACTED}, {"ok": "b"}]}));
    }

    #[test]
    fn test_scalars_pass_through() {
        let sanitizer = Sanitizer::new();
        assert_eq!(sanitizer.sanitize(&FieldValue::Null), FieldValue::Null);
        assert_eq!(sanitizer.sanitize(&FieldValue::Int(7)), FieldValue::Int(7));
        assert_eq!(
            sanitizer.sanitize(&FieldValue::from("password")),
            FieldValue::from("password")
        );

        let now = FieldValue::from(Utc::now());
        assert_eq!(sanitizer.sanitize(&now), now);
    }

    #[test]
    fn test_input_not_mutated() {
        let input = Metadata::new().with_field("token", "abc");
        let out = Sanitizer::new().sanitize_metadata(&input);
        assert_eq!(input.get("token"), Some(&FieldValue::from("abc")));
        assert_eq!(out.get("token"), Some(&FieldValue::from(REDACTED)));
    }

    #[test]
    fn test_depth_guard() {
        let mut value = FieldValue::from("leaf");
        for _ in 0..10 {
            let mut fields = Fields::new();
            fields.insert("next".to_string(), value);
            value = FieldValue::Object(fields);
        }

        let sanitizer = Sanitizer::new().with_max_depth(3);
        let out = sanitizer.sanitize(&value);
        let expected = json!({"next": {"next": {"next": DEPTH_MARKER}}});
        assert_eq!(out.to_json_value(), expected);

        // Truncated output is stable under a second pass
        assert_eq!(sanitizer.sanitize(&out), out);
    }

    #[test]
    fn test_idempotent() {
        let sanitizer = Sanitizer::new();
        let value = FieldValue::from(json!({
            "token": "t",
            "nested": {"items": [{"cvv": 123}, [1, 2, {"privateKey": "k"}]]},
        }));
        let once = sanitizer.sanitize(&value);
        assert_eq!(sanitizer.sanitize(&once), once);
    }
}
