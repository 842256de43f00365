//! Investment thesis: the criteria a job's candidates are screened against.

use serde::{Deserialize, Serialize};

use crate::types::FundingAsk;

/// Filter criteria submitted with a job. Immutable once the job is created.
///
/// Absent criteria mean "any". Ticket bounds are in thousands, like
/// [`FundingAsk`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestmentThesis {
    pub sector: Option<String>,
    pub stage: Option<String>,
    pub geography: Option<String>,
    #[serde(alias = "ticket_size_min")]
    pub ticket_min: Option<f64>,
    #[serde(alias = "ticket_size_max")]
    pub ticket_max: Option<f64>,
    /// Free-text strategic context
    #[serde(alias = "context_text")]
    pub context: Option<String>,
}

impl InvestmentThesis {
    pub fn ticket_range(&self) -> FundingAsk {
        FundingAsk {
            min: self.ticket_min,
            max: self.ticket_max,
        }
    }

    /// Bullet list used in scoring prompts and reports.
    pub fn describe(&self) -> String {
        let any = |v: &Option<String>| v.clone().unwrap_or_else(|| "Any".to_string());
        let ticket = if self.ticket_min.is_none() && self.ticket_max.is_none() {
            "Any".to_string()
        } else {
            self.ticket_range().display()
        };
        let mut lines = vec![
            format!("- Sector: {}", any(&self.sector)),
            format!("- Stage: {}", any(&self.stage)),
            format!("- Geography: {}", any(&self.geography)),
            format!("- Ticket size: {}", ticket),
        ];
        if let Some(context) = &self.context {
            lines.push(format!("- Strategic context: {}", context));
        }
        lines.join("\n")
    }

    pub fn validate(&self) -> crate::types::Result<()> {
        if let (Some(lo), Some(hi)) = (self.ticket_min, self.ticket_max)
            && lo > hi
        {
            return Err(crate::types::SiftError::InvalidRequest(format!(
                "ticket_min ({}) exceeds ticket_max ({})",
                lo, hi
            )));
        }
        for bound in [self.ticket_min, self.ticket_max].into_iter().flatten() {
            if !bound.is_finite() || bound < 0.0 {
                return Err(crate::types::SiftError::InvalidRequest(format!(
                    "ticket bound {} must be a non-negative number of thousands",
                    bound
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_accepts_submission_aliases() {
        let thesis: InvestmentThesis = serde_json::from_str(
            r#"{"sector": "Fintech", "ticket_size_min": 500, "context_text": "B2B only"}"#,
        )
        .unwrap();
        assert_eq!(thesis.sector.as_deref(), Some("Fintech"));
        assert_eq!(thesis.ticket_min, Some(500.0));
        assert_eq!(thesis.context.as_deref(), Some("B2B only"));
        assert_eq!(thesis.stage, None);
    }

    #[test]
    fn test_describe_defaults_to_any() {
        let text = InvestmentThesis::default().describe();
        assert!(text.contains("- Sector: Any"));
        assert!(text.contains("- Ticket size: Any"));
        assert!(!text.contains("Strategic context"));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let thesis = InvestmentThesis {
            ticket_min: Some(2000.0),
            ticket_max: Some(500.0),
            ..Default::default()
        };
        assert!(thesis.validate().is_err());
        assert!(InvestmentThesis::default().validate().is_ok());
    }
}
