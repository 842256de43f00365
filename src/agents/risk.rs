//! Risk Agent
//!
//! Synthesis step: reads the technical and market fragments plus the
//! relevance rationale, produces the heatmap, success probability and
//! recommendation. Only invoked once both fragments exist.

use serde_json::Value;

use super::{AgentContext, percent_score};
use crate::ai::PromptBuilder;
use crate::constants::llm::RAW_PREVIEW_CHARS;
use crate::types::{
    CandidateRecord, MarketAssessment, Recommendation, RelevanceScore, Result,
    RevenueProjection, RiskAssessment, RiskHeatmap, RiskLevel, SiftError, TechnicalAssessment,
    json_f64_opt, json_string, json_string_array, json_string_or, preview,
};

const SCHEMA: &str = r#"{
  "risk_heatmap": {"team": "green", "market": "green", "tech": "yellow",
                   "financial": "yellow", "execution": "green"},
  "success_rate": 68.5,
  "competition_difficulty": 55.0,
  "revenue_projection": {"year1": 800000, "year2": 3200000, "year3": 9500000,
                         "currency": "USD", "methodology": "..."},
  "profit_margin": 22.5,
  "key_points": ["Most important point first"],
  "overall_summary": "Three or four sentences",
  "detailed_analysis": "Two paragraphs",
  "recommendation": "strong_buy|buy|hold|pass"
}"#;

/// Everything the synthesis step reads besides the profile
#[derive(Debug, Clone, Copy)]
pub struct RiskInput<'a> {
    pub technical: &'a TechnicalAssessment,
    pub market: &'a MarketAssessment,
    pub relevance: Option<&'a RelevanceScore>,
}

#[derive(Clone)]
pub struct RiskAgent {
    ctx: AgentContext,
}

impl RiskAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn evaluate(
        &self,
        candidate: &CandidateRecord,
        input: RiskInput<'_>,
    ) -> Result<RiskAssessment> {
        let system = PromptBuilder::new()
            .role(
                "venture capital partner",
                "final investment recommendations from due diligence findings",
            )
            .objectives(&[
                "Rate team, market, tech, financial and execution risk as green, yellow or red",
                "Estimate success probability and competition difficulty from 0 to 100",
                "Project revenue for years one to three and state the method",
                "Rank the key points and recommend strong_buy, buy, hold or pass",
            ])
            .rules(&[
                "Use every finding provided; do not contradict the technical or market scores",
                "Pass on any red rating in team or market",
            ])
            .output_schema(SCHEMA)
            .build();

        let value = self
            .ctx
            .call(system, build_findings(candidate, &input))
            .await
            .map_err(|e| e.into_evaluation("risk", candidate.name()))?;

        parse_risk(&value).map_err(|message| SiftError::Evaluation {
            evaluator: "risk".to_string(),
            candidate: candidate.name().to_string(),
            message,
            raw: Some(preview(&value.to_string(), RAW_PREVIEW_CHARS)),
        })
    }
}

fn build_findings(candidate: &CandidateRecord, input: &RiskInput<'_>) -> String {
    let tech = input.technical;
    let market = input.market;
    let mut builder = PromptBuilder::new().section("Startup", &candidate.profile_block());

    builder = match input.relevance {
        Some(r) => builder
            .context_item("Relevance score", format!("{:.2}/1.0", r.score))
            .context_item("Fit reasoning", r.rationale.clone())
            .context_item("Matches", r.matches.join("; "))
            .context_item("Mismatches", r.mismatches.join("; ")),
        None => builder.context_item("Relevance score", "not available"),
    };

    let claims = tech
        .claims
        .iter()
        .map(|c| format!("- {} ({:?}): {}", c.claim, c.verdict, c.reasoning))
        .collect::<Vec<_>>()
        .join("\n");
    builder = builder
        .section(
            "Technical findings",
            &format!(
                "Score: {:.0}/100\n{}\nRisks: {}\nStrengths: {}\nWeaknesses: {}\nClaims:\n{}",
                tech.technical_score,
                tech.overall_assessment,
                tech.technical_risks.join("; "),
                tech.strengths.join("; "),
                tech.weaknesses.join("; "),
                claims
            ),
        )
        .section(
            "Market findings",
            &format!(
                "Score: {:.0}/100\nTAM: {}\nGrowth: {}\nDirect competitors: {}\nPosition: {}\nRevenue model: {}\nBurn rate: {}\nKey insight: {}",
                market.market_score,
                market.sizing.tam.as_deref().unwrap_or("unknown"),
                market.sizing.growth_rate.as_deref().unwrap_or("unknown"),
                market.competitors.direct.join(", "),
                market.competitors.position.as_deref().unwrap_or("unknown"),
                market.financials.revenue_model.as_deref().unwrap_or("unknown"),
                market.financials.burn_rate.as_deref().unwrap_or("unknown"),
                market.key_insight.as_deref().unwrap_or("none"),
            ),
        );
    builder.build()
}

/// Heatmap cell; a missing or unrecognized level is an error, never a guess
fn risk_level(heatmap: &Value, dimension: &str) -> std::result::Result<RiskLevel, String> {
    let raw = match heatmap.get(dimension) {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(obj @ Value::Object(_)) => obj.get("level").and_then(|l| l.as_str()),
        _ => None,
    };
    match raw {
        Some(level) => RiskLevel::parse(level)
            .ok_or_else(|| format!("risk_heatmap.{} has unknown level '{}'", dimension, level)),
        None => Err(format!("risk_heatmap.{} is missing", dimension)),
    }
}

fn parse_recommendation(value: &Value) -> std::result::Result<Recommendation, String> {
    match json_string(value, "recommendation") {
        Some(raw) => Recommendation::parse(&raw).ok_or_else(|| {
            format!(
                "recommendation '{}' is not one of strong_buy, buy, hold, pass",
                raw
            )
        }),
        None => Err("recommendation is missing".to_string()),
    }
}

/// Map the synthesis reply. Error messages name the offending field.
fn parse_risk(value: &Value) -> std::result::Result<RiskAssessment, String> {
    let empty = Value::Null;
    let heatmap = value.get("risk_heatmap").unwrap_or(&empty);
    let projection = value.get("revenue_projection").unwrap_or(&empty);

    let profit_margin = match value.get("profit_margin") {
        Some(Value::Number(n)) => n.as_f64().map(|m| format!("{}%", m)),
        _ => json_string(value, "profit_margin"),
    };

    Ok(RiskAssessment {
        heatmap: RiskHeatmap {
            team: risk_level(heatmap, "team")?,
            market: risk_level(heatmap, "market")?,
            tech: risk_level(heatmap, "tech")?,
            financial: risk_level(heatmap, "financial")?,
            execution: risk_level(heatmap, "execution")?,
        },
        success_probability: percent_score(value, "success_rate", 50.0),
        competition_difficulty: percent_score(value, "competition_difficulty", 50.0),
        revenue_projection: RevenueProjection {
            year1: json_f64_opt(projection, "year1"),
            year2: json_f64_opt(projection, "year2"),
            year3: json_f64_opt(projection, "year3"),
            currency: json_string_or(projection, "currency", "USD"),
            methodology: json_string(projection, "methodology"),
        },
        profit_margin,
        key_points: json_string_array(value, "key_points"),
        summary: json_string_or(value, "overall_summary", ""),
        detailed_analysis: json_string(value, "detailed_analysis"),
        recommendation: parse_recommendation(value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::config::AgentRole;
    use crate::types::assessment::fixtures;
    use crate::types::{CandidateProfile, ClaimVerdict};
    use serde_json::json;

    fn candidate() -> CandidateRecord {
        CandidateRecord {
            id: Default::default(),
            job_id: Default::default(),
            source_unit_id: None,
            extraction_order: 0,
            profile: CandidateProfile {
                name: "Acme".to_string(),
                ..Default::default()
            },
            relevance: None,
        }
    }

    #[test]
    fn test_parse_full_output() {
        let value = json!({
            "risk_heatmap": {"team": "green", "market": {"level": "RED"}, "tech": "amber",
                             "financial": "high", "execution": "medium"},
            "success_rate": 68.5,
            "competition_difficulty": 0.55,
            "revenue_projection": {"year1": 800000, "year2": "3200000", "currency": "EUR"},
            "profit_margin": 22.5,
            "key_points": ["Repeat founder"],
            "overall_summary": "Strong team",
            "recommendation": "Strong Buy"
        });
        let risk = parse_risk(&value).unwrap();
        assert_eq!(risk.heatmap.team, RiskLevel::Green);
        assert_eq!(risk.heatmap.market, RiskLevel::Red);
        assert_eq!(risk.heatmap.tech, RiskLevel::Yellow);
        assert_eq!(risk.heatmap.financial, RiskLevel::Red);
        assert_eq!(risk.heatmap.execution, RiskLevel::Yellow);
        assert_eq!(risk.success_probability, 68.5);
        assert!((risk.competition_difficulty - 55.0).abs() < 1e-9);
        assert_eq!(risk.revenue_projection.year2, Some(3_200_000.0));
        assert_eq!(risk.revenue_projection.year3, None);
        assert_eq!(risk.revenue_projection.currency, "EUR");
        assert_eq!(risk.profit_margin.as_deref(), Some("22.5%"));
        assert_eq!(risk.recommendation, Recommendation::StrongBuy);
        assert!(risk.validate().is_ok());
    }

    fn heatmap() -> Value {
        json!({"team": "green", "market": "yellow", "tech": "green",
               "financial": "red", "execution": "yellow"})
    }

    #[test]
    fn test_missing_scores_default_and_empty_summary_rejected_on_validate() {
        let risk = parse_risk(&json!({"risk_heatmap": heatmap(), "recommendation": "hold"}))
            .unwrap();
        assert_eq!(risk.success_probability, 50.0);
        assert_eq!(risk.recommendation, Recommendation::Hold);
        assert!(risk.validate().is_err());
    }

    #[test]
    fn test_recommendation_outside_enum_is_rejected() {
        for recommendation in [json!("invest now"), json!(null), json!(3)] {
            let value = json!({
                "risk_heatmap": heatmap(),
                "success_rate": 70,
                "overall_summary": "ok",
                "recommendation": recommendation
            });
            let err = parse_risk(&value).unwrap_err();
            assert!(err.contains("recommendation"), "{err}");
        }
    }

    #[test]
    fn test_heatmap_level_must_be_known() {
        let mut cells = heatmap();
        cells["tech"] = json!("purple");
        let value = json!({"risk_heatmap": cells, "overall_summary": "ok", "recommendation": "buy"});
        assert!(parse_risk(&value).unwrap_err().contains("risk_heatmap.tech"));

        let mut cells = heatmap();
        cells.as_object_mut().unwrap().remove("execution");
        let value = json!({"risk_heatmap": cells, "overall_summary": "ok", "recommendation": "buy"});
        assert!(parse_risk(&value).unwrap_err().contains("risk_heatmap.execution"));
    }

    #[tokio::test]
    async fn test_unknown_recommendation_is_an_evaluation_error() {
        let provider = replying(
            r#"{"risk_heatmap": {"team": "green", "market": "green", "tech": "green",
                "financial": "green", "execution": "green"},
                "success_rate": 70, "overall_summary": "ok", "recommendation": "invest now"}"#,
        );
        let agent = RiskAgent::new(context(AgentRole::Risk, provider));
        let err = agent
            .evaluate(
                &candidate(),
                RiskInput {
                    technical: &fixtures::technical(70.0),
                    market: &fixtures::market(70.0),
                    relevance: None,
                },
            )
            .await
            .unwrap_err();
        match err {
            SiftError::Evaluation {
                evaluator,
                candidate,
                raw,
                ..
            } => {
                assert_eq!(evaluator, "risk");
                assert_eq!(candidate, "Acme");
                assert!(raw.unwrap().contains("invest now"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_prior_findings() {
        let provider = replying(
            r#"{"risk_heatmap": {"team": "green", "market": "green", "tech": "yellow",
                "financial": "yellow", "execution": "green"},
                "success_rate": 70, "overall_summary": "ok", "recommendation": "buy"}"#,
        );
        let agent = RiskAgent::new(context(AgentRole::Risk, provider.clone()));
        let technical = fixtures::technical(81.0);
        let market = fixtures::market(64.0);
        let relevance = RelevanceScore {
            score: 0.9,
            rationale: "Perfect sector fit".to_string(),
            matches: vec!["FinTech".to_string()],
            mismatches: vec![],
        };

        let risk = agent
            .evaluate(
                &candidate(),
                RiskInput {
                    technical: &technical,
                    market: &market,
                    relevance: Some(&relevance),
                },
            )
            .await
            .unwrap();
        assert_eq!(risk.success_probability, 70.0);
        assert_eq!(technical.claims[0].verdict, ClaimVerdict::Feasible);

        let prompt = &provider.calls_for(AgentRole::Risk)[0];
        assert!(prompt.contains("**Fit reasoning**: Perfect sector fit"));
        assert!(prompt.contains("Score: 81/100"));
        assert!(prompt.contains("Score: 64/100"));
        assert!(prompt.contains("TAM: $10B"));
    }
}
