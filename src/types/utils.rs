//! Shared utility functions for type serialization and common operations.
//!
//! ## JSON Extraction Helpers
//!
//! Ergonomic helpers for reading loosely-shaped backend output:
//! - `json_string`, `json_string_or` - Extract non-empty strings
//! - `json_string_array` - Extract string arrays (tolerates a single string)
//! - `json_f64`, `json_f64_opt` - Extract numbers (tolerates numeric strings)

use serde_json::Value;

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Extract a trimmed, non-empty string by key.
///
/// Literal placeholders such as `"null"` or `"N/A"` count as absent.
#[inline]
pub fn json_string(value: &Value, key: &str) -> Option<String> {
    let s = value.get(key)?.as_str()?.trim();
    if s.is_empty() || is_placeholder(s) {
        None
    } else {
        Some(s.to_string())
    }
}

/// Extract string with default value.
#[inline]
pub fn json_string_or(value: &Value, key: &str, default: &str) -> String {
    json_string(value, key).unwrap_or_else(|| default.to_string())
}

/// Extract string array from JSON value by key.
pub fn json_string_array(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|s| s.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() && !is_placeholder(s.trim()) => {
            vec![s.trim().to_string()]
        }
        _ => Vec::new(),
    }
}

/// Extract an optional f64; numeric strings like `"72.5"` or `"72%"` are accepted.
pub fn json_f64_opt(value: &Value, key: &str) -> Option<f64> {
    let parsed: Option<f64> = match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Extract f64 with default.
#[inline]
pub fn json_f64(value: &Value, key: &str, default: f64) -> f64 {
    json_f64_opt(value, key).unwrap_or(default)
}

fn is_placeholder(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "null" | "none" | "n/a" | "na" | "unknown" | "not specified"
    )
}

// =============================================================================
// String Utilities
// =============================================================================

/// Take at most `max_chars` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Short preview of backend output for logs and error messages.
pub fn preview(s: &str, max_chars: usize) -> String {
    let head = truncate_chars(s, max_chars);
    if head.len() < s.len() {
        format!("{}...", head)
    } else {
        head.to_string()
    }
}
