//! Backend output validation
//!
//! Roles never trust raw completions: text is reduced to a JSON object here,
//! then each role maps fields with its own defaults and range checks.

mod json_repair;

pub use json_repair::{extract_structured, strip_fences};
