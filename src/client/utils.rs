//! Utility functions for the API client.
//!
//! This module provides helpers for:
//! - Status code classification (failover, unauthorized)
//! - Parsing response bodies with a raw-text fallback
//! - Synthesizing error messages from error bodies

use serde_json::Value;

/// Statuses that move a same-origin request on to the next candidate.
///
/// A proxy answering 404/502/503/504 usually means the backend behind it is
/// missing or down, not that the resource does not exist.
pub fn is_failover_status(status: u16) -> bool {
    matches!(status, 404 | 502 | 503 | 504)
}

/// Check if status code indicates a rejected credential
pub fn is_unauthorized(status: u16) -> bool {
    status == 401
}

/// Check if status code is 2xx
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Parse a response body as JSON, falling back to the raw text.
///
/// An empty body yields `Value::Null`.
///
/// # Examples
///
/// ```
/// use dashboard_client::client::parse_body;
/// use serde_json::json;
///
/// assert_eq!(parse_body(br#"{"id": 1}"#), json!({"id": 1}));
/// assert_eq!(parse_body(b"Bad Gateway"), json!("Bad Gateway"));
/// assert_eq!(parse_body(b""), serde_json::Value::Null);
/// ```
pub fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Build the message for a non-2xx response.
///
/// Preference order: `detail`, `message`, `error.message`, the raw text
/// body, then `HTTP <status>`.
pub fn error_message(status: u16, body: &Value) -> String {
    let structured = body
        .get("detail")
        .and_then(describe)
        .or_else(|| body.get("message").and_then(describe))
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.get("message"))
                .and_then(describe)
        });
    if let Some(message) = structured {
        return message;
    }

    match body {
        Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => format!("HTTP {}", status),
    }
}

/// Text for a message field. Validation errors arrive as a list of
/// `{msg: ...}` records and are joined.
fn describe(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item.get("msg") {
                    Some(Value::String(msg)) => Some(msg.clone()),
                    _ => describe(item),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}
