//! Response-shape helpers shared across panel dialects.

use serde_json::Value;

/// Unwrap the `{ "response": … }` envelope some panels put around every
/// payload. Values without the envelope pass through untouched.
pub(crate) fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("response") => {
            map.remove("response").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Extract the user list from either a bare array or a `{ "users": […] }`
/// wrapper.
pub(crate) fn user_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("users") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Permissive aliveness check across panel dialects: a status string of
/// "active" (any case) or any of the boolean enable flags.
pub(crate) fn is_active_record(raw: &Value) -> bool {
    if let Some(s) = raw.get("status").and_then(Value::as_str)
        && s.eq_ignore_ascii_case("active")
    {
        return true;
    }
    ["is_active", "enable", "enabled", "isActive"]
        .iter()
        .any(|key| raw.get(*key).and_then(Value::as_bool) == Some(true))
}

/// An integer field that tolerates float encodings, defaulting to zero.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn int_field(raw: &Value, key: &str) -> i64 {
    raw.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

/// A non-empty string field, or `None`.
pub(crate) fn non_empty_str(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
