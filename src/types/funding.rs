//! Funding-ask normalization
//!
//! All amounts are stored in thousands of currency units. Sources express
//! magnitude in many ways ("$2M", "$2,000k", "500K-1M", "$5M+", "2000"), so
//! every amount goes through [`FundingAsk::parse`] before it reaches a
//! candidate record.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(thousand|million|billion|mm|mn|bn|k|m|b)?\b",
    )
    .expect("amount regex is valid")
});

/// Requested funding range in thousands. `max == None` with `min` set means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FundingAsk {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FundingAsk {
    pub fn exact(thousands: f64) -> Self {
        Self {
            min: Some(thousands),
            max: Some(thousands),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Parse a free-form amount or range.
    ///
    /// Bare numbers are already thousands. In a range, a suffix on the right
    /// operand also applies to an unsuffixed left operand (`1-3M` is 1000..3000).
    /// A trailing `+` leaves the range open above.
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Self::default();
        }

        let mut amounts: Vec<(f64, Option<f64>)> = AMOUNT_RE
            .captures_iter(text)
            .filter_map(|caps| {
                let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
                let multiplier = caps.get(2).map(|m| suffix_multiplier(m.as_str()));
                Some((number, multiplier))
            })
            .take(2)
            .collect();

        if amounts.is_empty() {
            return Self::default();
        }

        if amounts.len() == 2 && amounts[0].1.is_none() {
            amounts[0].1 = amounts[1].1;
        }

        let values: Vec<f64> = amounts
            .iter()
            .map(|(n, mult)| round_thousands(n * mult.unwrap_or(1.0)))
            .collect();

        let open_ended = text.ends_with('+') || text.contains("+ ") || text.contains("+$");

        match values.as_slice() {
            [single] if open_ended => Self {
                min: Some(*single),
                max: None,
            },
            [single] => Self::exact(*single),
            [low, high] => Self {
                min: Some(low.min(*high)),
                max: if open_ended {
                    None
                } else {
                    Some(low.max(*high))
                },
            },
            _ => Self::default(),
        }
    }

    /// Read a funding bound from backend output: numbers are thousands already,
    /// strings go through [`FundingAsk::parse`].
    pub fn bound_from_json(value: Option<&Value>) -> Option<f64> {
        match value? {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
            Value::String(s) => Self::parse(s).min,
            _ => None,
        }
    }

    /// Build from separate min/max backend fields.
    pub fn from_json_bounds(min: Option<&Value>, max: Option<&Value>) -> Self {
        let min = Self::bound_from_json(min);
        let max = Self::bound_from_json(max);
        match (min, max) {
            (Some(lo), Some(hi)) if lo > hi => Self {
                min: Some(hi),
                max: Some(lo),
            },
            _ => Self { min, max },
        }
    }

    /// Human-readable rendering, e.g. `$500k - $1.5M` or `$2M+`.
    pub fn display(&self) -> String {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) if (lo - hi).abs() < f64::EPSILON => format_thousands(lo),
            (Some(lo), Some(hi)) => format!("{} - {}", format_thousands(lo), format_thousands(hi)),
            (Some(lo), None) => format!("{}+", format_thousands(lo)),
            (None, Some(hi)) => format!("up to {}", format_thousands(hi)),
            (None, None) => "n/a".to_string(),
        }
    }
}

fn suffix_multiplier(suffix: &str) -> f64 {
    match suffix.to_ascii_lowercase().as_str() {
        "k" | "thousand" => 1.0,
        "m" | "mm" | "mn" | "million" => 1_000.0,
        "b" | "bn" | "billion" => 1_000_000.0,
        _ => 1.0,
    }
}

fn round_thousands(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn format_thousands(v: f64) -> String {
    if v >= 1000.0 {
        let millions = v / 1000.0;
        if millions.fract() == 0.0 {
            format!("${}M", millions)
        } else {
            format!("${:.1}M", millions)
        }
    } else {
        format!("${}k", v)
    }
}
