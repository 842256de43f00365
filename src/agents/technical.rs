//! Technical Agent
//!
//! Feasibility verdict per claim plus an aggregate technical score.

use serde_json::Value;

use super::{AgentContext, percent_score};
use crate::ai::PromptBuilder;
use crate::types::{
    CandidateRecord, ClaimCheck, ClaimVerdict, Result, TechnicalAssessment, json_string,
    json_string_array, json_string_or,
};

const SCHEMA: &str = r#"{
  "overall_assessment": "Two or three sentences",
  "claims_validated": [
    {"claim": "...", "verdict": "feasible|questionable|unlikely",
     "reasoning": "...", "evidence": "...", "risk_level": "low|medium|high"}
  ],
  "technical_risks": ["..."],
  "technical_score": 72,
  "key_strengths": ["..."],
  "key_weaknesses": ["..."],
  "scalability_assessment": "...",
  "team_depth_rating": "...",
  "competitive_moat": "..."
}"#;

#[derive(Clone)]
pub struct TechnicalAgent {
    ctx: AgentContext,
}

impl TechnicalAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn evaluate(&self, candidate: &CandidateRecord) -> Result<TechnicalAssessment> {
        let system = PromptBuilder::new()
            .role(
                "technical due diligence partner",
                "judging whether startup technology claims are feasible",
            )
            .objectives(&[
                "Assess each stated claim as feasible, questionable or unlikely",
                "Identify technical risks, scalability limits and defensibility",
                "Rate the technical depth of the team",
                "Give an overall technical score from 0 to 100",
            ])
            .rules(&["Ground every verdict in the profile; say so when evidence is thin"])
            .output_schema(SCHEMA)
            .build();

        let value = self
            .ctx
            .call(system, candidate.profile_block())
            .await
            .map_err(|e| e.into_evaluation("technical", candidate.name()))?;

        Ok(parse_technical(&value))
    }
}

fn parse_technical(value: &Value) -> TechnicalAssessment {
    let claims = value
        .get("claims_validated")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|c| {
                    Some(ClaimCheck {
                        claim: json_string(c, "claim")?,
                        verdict: json_string(c, "verdict")
                            .and_then(|v| ClaimVerdict::parse(&v))
                            .unwrap_or(ClaimVerdict::Questionable),
                        reasoning: json_string_or(c, "reasoning", ""),
                        evidence: json_string(c, "evidence"),
                        risk_level: json_string(c, "risk_level"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    TechnicalAssessment {
        overall_assessment: json_string_or(value, "overall_assessment", ""),
        claims,
        technical_risks: json_string_array(value, "technical_risks"),
        technical_score: percent_score(value, "technical_score", 50.0),
        strengths: json_string_array(value, "key_strengths"),
        weaknesses: json_string_array(value, "key_weaknesses"),
        scalability: json_string(value, "scalability_assessment"),
        team_depth: json_string(value, "team_depth_rating"),
        competitive_moat: json_string(value, "competitive_moat"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::config::AgentRole;
    use serde_json::json;

    #[test]
    fn test_parse_claims_and_defaults() {
        let value = json!({
            "overall_assessment": "Credible",
            "claims_validated": [
                {"claim": "10x faster", "verdict": "Plausible", "reasoning": "GPU"},
                {"claim": "Quantum moat", "verdict": "???"},
                {"verdict": "feasible"}
            ],
            "technical_score": 0.8,
            "key_strengths": "Strong CTO"
        });
        let tech = parse_technical(&value);
        assert_eq!(tech.claims.len(), 2);
        assert_eq!(tech.claims[0].verdict, ClaimVerdict::Feasible);
        assert_eq!(tech.claims[1].verdict, ClaimVerdict::Questionable);
        assert!((tech.technical_score - 80.0).abs() < 1e-9);
        assert_eq!(tech.strengths, vec!["Strong CTO"]);

        assert_eq!(parse_technical(&json!({})).technical_score, 50.0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_evaluation_error() {
        let provider = replying("not json at all");
        let agent = TechnicalAgent::new(context(AgentRole::Technical, provider));
        let candidate = crate::types::CandidateRecord {
            id: Default::default(),
            job_id: Default::default(),
            source_unit_id: None,
            extraction_order: 0,
            profile: crate::types::CandidateProfile {
                name: "Acme".to_string(),
                ..Default::default()
            },
            relevance: None,
        };
        let err = agent.evaluate(&candidate).await.unwrap_err();
        assert_eq!(err.kind(), "EvaluationError");
        assert!(err.to_string().contains("technical evaluation failed for Acme"));
    }
}
