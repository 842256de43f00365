//! Structured-output extraction
//!
//! Every role's reply goes through [`extract_structured`]:
//! 1. If the text contains a fenced block (```json ... ``` or ``` ... ```),
//!    its inner content is used; otherwise the whole text.
//! 2. Parse as JSON.
//! 3. On failure, repair common damage (BOM, trailing commas, truncated
//!    strings, unbalanced brackets) and, as a last resort, pull the first
//!    balanced object out of surrounding prose.
//!
//! Failure is `SiftError::MalformedOutput` carrying the raw text.

use serde_json::Value;
use tracing::debug;

use crate::constants::llm as llm_constants;
use crate::types::{Result, SiftError, preview};

/// Parse a JSON object out of raw backend text.
pub fn extract_structured(text: &str) -> Result<Value> {
    let body = strip_fences(text).trim_start_matches('\u{feff}').trim();

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return expect_object(value, text);
    }

    debug!("Structured output did not parse, attempting repair");

    let repaired = balance_brackets(&fix_truncated_strings(&fix_trailing_commas(body)));
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        return expect_object(value, text);
    }

    if let Some(embedded) = first_balanced_object(body)
        && let Ok(value) = serde_json::from_str::<Value>(&fix_trailing_commas(embedded))
    {
        return expect_object(value, text);
    }

    Err(SiftError::MalformedOutput {
        message: format!(
            "no JSON object in output: {}",
            preview(body, llm_constants::RAW_PREVIEW_CHARS)
        ),
        raw: text.to_string(),
    })
}

fn expect_object(value: Value, raw: &str) -> Result<Value> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(SiftError::MalformedOutput {
            message: "expected a JSON object".to_string(),
            raw: raw.to_string(),
        })
    }
}

/// Inner content of the first fenced block, or the input unchanged.
///
/// An unterminated fence yields everything after the opening line.
pub fn strip_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_ticks = &text[open + 3..];
    let body_start = match after_ticks.find('\n') {
        Some(nl) => nl + 1,
        // Single line: ```{"a":1}```
        None => after_ticks
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after_ticks.len()),
    };
    let body = &after_ticks[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// Remove commas directly before `]` or `}` outside strings
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(ch);
    }
    result
}

/// Close a string cut off by the token limit
fn fix_truncated_strings(s: &str) -> String {
    let mut in_string = false;
    let mut escape = false;
    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    let mut result = s.to_string();
    if escape {
        result.pop();
    }
    if in_string {
        result.push('"');
    }
    result
}

/// Append missing closers in nesting order
fn balance_brackets(s: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut result = s.trim_end().trim_end_matches(',').to_string();
    while let Some(closer) = stack.pop() {
        result.push(closer);
    }
    result
}

/// First `{...}` span with balanced braces, ignoring braces inside strings
fn first_balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
