//! Scoring Agent
//!
//! Relevance of one candidate to the job's investment thesis, in `[0, 1]`.

use tracing::debug;

use super::AgentContext;
use crate::ai::PromptBuilder;
use crate::types::{
    CandidateRecord, InvestmentThesis, RelevanceScore, Result, SiftError, json_f64_opt,
    json_string_array, json_string_or,
};

const SCHEMA: &str = r#"{
  "relevance_score": 0.75,
  "reasoning": "Two or three sentences on the deciding factors",
  "matches": ["Alignment point"],
  "mismatches": ["Concern or gap"]
}"#;

#[derive(Clone)]
pub struct ScoringAgent {
    ctx: AgentContext,
}

/// Read a backend score into `[0, 1]`.
///
/// Values in `(1, 100]` are percentages. Anything else outside `[0, 1]` is
/// rejected.
pub fn normalize_relevance(raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        None
    } else if (0.0..=1.0).contains(&raw) {
        Some(raw)
    } else if raw > 1.0 && raw <= 100.0 {
        Some(raw / 100.0)
    } else {
        None
    }
}

impl ScoringAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn score(
        &self,
        candidate: &CandidateRecord,
        thesis: &InvestmentThesis,
    ) -> Result<RelevanceScore> {
        let name = candidate.name();
        let system = PromptBuilder::new()
            .role(
                "venture capital investment analyst",
                "matching startups against an investment thesis",
            )
            .objectives(&[
                "Weigh sector alignment, stage fit, geography and check size against the thesis",
                "Consider traction and team as supporting evidence",
                "Assign a relevance score from 0.0 (no match) to 1.0 (ideal match)",
            ])
            .rules(&[
                "Be strict on the primary sector",
                "Name concrete matches and mismatches",
            ])
            .output_schema(SCHEMA)
            .build();
        let user = format!(
            "# Investment thesis\n{}\n\n# Startup\n{}",
            thesis.describe(),
            candidate.profile_block()
        );

        let value = self
            .ctx
            .call(system, user)
            .await
            .map_err(|e| e.into_scoring(name))?;

        let raw_score = json_f64_opt(&value, "relevance_score").ok_or_else(|| SiftError::Scoring {
            candidate: name.to_string(),
            message: "missing relevance_score".to_string(),
            raw: Some(value.to_string()),
        })?;
        let score = normalize_relevance(raw_score).ok_or_else(|| SiftError::Scoring {
            candidate: name.to_string(),
            message: format!("relevance_score out of range: {}", raw_score),
            raw: Some(value.to_string()),
        })?;

        debug!(candidate = name, score, "Scored candidate");
        Ok(RelevanceScore {
            score,
            rationale: json_string_or(&value, "reasoning", ""),
            matches: json_string_array(&value, "matches"),
            mismatches: json_string_array(&value, "mismatches"),
        })
    }
}
