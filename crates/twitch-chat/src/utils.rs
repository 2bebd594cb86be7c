//! Small helpers shared across the parsing and formatting code.

use chrono::DateTime;
use serde_json::{Value, json};

/// Parses an RFC 3339 timestamp (the format used by the Twitch API) into
/// epoch microseconds. Returns `None` for anything unparseable.
pub fn timestamp_to_microseconds(timestamp: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|dt| dt.timestamp_micros())
}

/// Formats a duration in seconds as `h:mm:ss`, or `m:ss` below an hour.
/// Negative durations keep a leading `-`.
pub fn seconds_to_time(seconds: i64) -> String {
    let total = seconds.abs();
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    let sign = if seconds < 0 { "-" } else { "" };
    if h > 0 {
        format!("{sign}{h}:{m:02}:{s:02}")
    } else {
        format!("{sign}{m}:{s:02}")
    }
}

/// Best-effort integer coercion for JSON values. Strings must be plain
/// base-10 integers, floats are truncated towards zero.
pub fn int_or_none(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn replace_with_underscores(text: &str) -> String {
    text.replace('-', "_")
}

/// Builds the JSON description of an image asset. The identifier is the
/// `WxH` dimension string.
pub fn image(url: &str, width: u32, height: u32) -> Value {
    json!({
        "url": url,
        "width": width,
        "height": height,
        "id": format!("{width}x{height}"),
    })
}

/// Whether a JSON value carries any content: null, `false`, zero, the
/// empty string and empty collections all count as empty. Used where the
/// API signals "no more" by omitting, nulling or blanking a field.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}
