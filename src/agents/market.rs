//! Market Agent
//!
//! Market sizing, competitor map and financial viability for one candidate.

use serde_json::Value;

use super::{AgentContext, percent_score};
use crate::ai::PromptBuilder;
use crate::types::{
    CandidateRecord, CompetitorMap, FinancialCheck, MarketAssessment, MarketSizing, Result,
    json_string, json_string_array,
};

const SCHEMA: &str = r#"{
  "market_analysis": {
    "tam": "...", "sam": "...", "som": "...", "growth_rate": "...",
    "trends": ["..."], "maturity": "...", "timing": "...", "risks": ["..."]
  },
  "competitor_map": {
    "direct": ["..."], "indirect": ["..."],
    "advantages": ["..."], "disadvantages": ["..."], "position": "..."
  },
  "financial_check": {
    "revenue_potential": "...", "revenue_model": "...", "unit_economics": "...",
    "burn_rate": "...", "path_to_profitability": "...",
    "capital_efficiency": "...", "financial_risks": ["..."]
  },
  "market_score": 65,
  "key_insight": "One sentence"
}"#;

#[derive(Clone)]
pub struct MarketAgent {
    ctx: AgentContext,
}

impl MarketAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn evaluate(&self, candidate: &CandidateRecord) -> Result<MarketAssessment> {
        let system = PromptBuilder::new()
            .role(
                "market research analyst",
                "sizing markets and mapping competition for early-stage startups",
            )
            .objectives(&[
                "Estimate TAM, SAM and SOM with growth rate and market maturity",
                "Map direct and indirect competitors and the startup's position",
                "Check revenue model, unit economics and path to profitability",
                "Give an overall market score from 0 to 100",
            ])
            .rules(&["Mark estimates as estimates; never present guesses as reported figures"])
            .output_schema(SCHEMA)
            .build();

        let value = self
            .ctx
            .call(system, candidate.profile_block())
            .await
            .map_err(|e| e.into_evaluation("market", candidate.name()))?;

        Ok(parse_market(&value))
    }
}

fn parse_market(value: &Value) -> MarketAssessment {
    let empty = Value::Null;
    let sizing = value.get("market_analysis").unwrap_or(&empty);
    let competitors = value.get("competitor_map").unwrap_or(&empty);
    let financials = value.get("financial_check").unwrap_or(&empty);

    MarketAssessment {
        sizing: MarketSizing {
            tam: json_string(sizing, "tam"),
            sam: json_string(sizing, "sam"),
            som: json_string(sizing, "som"),
            growth_rate: json_string(sizing, "growth_rate"),
            trends: json_string_array(sizing, "trends"),
            maturity: json_string(sizing, "maturity"),
            timing: json_string(sizing, "timing"),
            risks: json_string_array(sizing, "risks"),
        },
        competitors: CompetitorMap {
            direct: json_string_array(competitors, "direct"),
            indirect: json_string_array(competitors, "indirect"),
            advantages: json_string_array(competitors, "advantages"),
            disadvantages: json_string_array(competitors, "disadvantages"),
            position: json_string(competitors, "position"),
        },
        financials: FinancialCheck {
            revenue_potential: json_string(financials, "revenue_potential"),
            revenue_model: json_string(financials, "revenue_model"),
            unit_economics: json_string(financials, "unit_economics"),
            burn_rate: json_string(financials, "burn_rate"),
            path_to_profitability: json_string(financials, "path_to_profitability"),
            capital_efficiency: json_string(financials, "capital_efficiency"),
            risks: json_string_array(financials, "financial_risks"),
        },
        market_score: percent_score(value, "market_score", 50.0),
        key_insight: json_string(value, "key_insight"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_sections() {
        let value = json!({
            "market_analysis": {"tam": "$40B", "trends": ["Embedded finance"]},
            "competitor_map": {"direct": ["Stripe", "Adyen"], "position": "Niche"},
            "financial_check": {"burn_rate": "$80k/month", "financial_risks": "Long sales cycle"},
            "market_score": 68,
            "key_insight": "Mid-market is underserved"
        });
        let market = parse_market(&value);
        assert_eq!(market.sizing.tam.as_deref(), Some("$40B"));
        assert_eq!(market.sizing.trends, vec!["Embedded finance"]);
        assert_eq!(market.competitors.direct.len(), 2);
        assert_eq!(market.financials.risks, vec!["Long sales cycle"]);
        assert_eq!(market.market_score, 68.0);
        assert!(market.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let market = parse_market(&json!({"market_score": 0.5}));
        assert_eq!(market.sizing, MarketSizing::default());
        assert_eq!(market.market_score, 50.0);
    }
}
