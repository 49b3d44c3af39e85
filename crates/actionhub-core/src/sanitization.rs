//! Redaction of credential-like values before payloads are logged or kept on error records

use serde_json::{Map, Value as JsonValue};

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "access_token",
    "refresh_token",
    "client_secret",
    "api_key",
    "apikey",
    "x-api-key",
    "authorization",
    "secret",
    "private_key",
    "credentials",
];

const SENSITIVE_SUFFIXES: &[&str] = &["_token", "_secret", "_password", "_key"];

pub const REDACTED: &str = "***REDACTED***";

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str()) || SENSITIVE_SUFFIXES.iter().any(|s| key.ends_with(s))
}

/// Returns a copy of `value` with every sensitive field replaced by [`REDACTED`].
///
/// Whole subtrees under a sensitive key are replaced, so a `credentials` object
/// never leaks its children.
pub fn redact(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(redact_map(map)),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

pub fn redact_map(map: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    map.iter()
        .map(|(key, val)| {
            let val = if is_sensitive_key(key) && !val.is_null() {
                JsonValue::String(REDACTED.to_string())
            } else {
                redact(val)
            };
            (key.clone(), val)
        })
        .collect()
}
