//! Extraction Agent
//!
//! Document text (first `max_document_chars` characters) plus any recovered
//! tables in, one [`CandidateProfile`] out. Absent evidence stays absent;
//! funding bounds are normalized to thousands.

use serde_json::Value;
use tracing::debug;

use super::AgentContext;
use crate::ai::PromptBuilder;
use crate::types::{
    CandidateMetadata, CandidateProfile, FundingAsk, Result, SiftError, json_string,
    json_string_array, truncate_chars,
};

/// Tables beyond this are not sent
const MAX_TABLES: usize = 3;
const MAX_TABLE_ROWS: usize = 20;

const SCHEMA: &str = r#"{
  "name": "Company Name",
  "sector": "AI/ML",
  "stage": "Seed",
  "geography": "San Francisco, USA",
  "ticket_size_min": 1000,
  "ticket_size_max": 2000,
  "summary": "Two or three sentences: what they do, for whom, key value",
  "team": ["Founder Name (Role, Background)"],
  "traction": "Concrete metrics",
  "product": "What the product does",
  "claims": ["Quantifiable claim"]
}"#;

/// One document to extract
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    /// Identifies the unit in logs and errors
    pub label: &'a str,
    pub text: &'a str,
    pub tables: &'a [Vec<Vec<String>>],
}

#[derive(Clone)]
pub struct ExtractionAgent {
    ctx: AgentContext,
    max_document_chars: usize,
}

impl ExtractionAgent {
    pub fn new(ctx: AgentContext, max_document_chars: usize) -> Self {
        Self {
            ctx,
            max_document_chars,
        }
    }

    pub async fn extract(&self, input: ExtractionInput<'_>) -> Result<CandidateProfile> {
        let (system, user) = self.build_prompt(&input);
        let value = self
            .ctx
            .call(system, user)
            .await
            .map_err(|e| e.into_extraction(input.label))?;

        let profile = parse_profile(&value);
        if !profile.is_valid() {
            return Err(SiftError::Extraction {
                unit: input.label.to_string(),
                message: "no company name in output".to_string(),
                raw: Some(value.to_string()),
            });
        }
        debug!(unit = input.label, name = %profile.name, "Extracted candidate");
        Ok(profile)
    }

    fn build_prompt(&self, input: &ExtractionInput<'_>) -> (String, String) {
        let system = PromptBuilder::new()
            .role(
                "data extraction specialist",
                "reading startup pitch decks for venture capital analysis",
            )
            .objectives(&[
                "Identify the company name, sector, funding stage and geography",
                "Extract the requested funding amount in thousands (500K = 500, 2M = 2000)",
                "Summarize the business, product, team and traction from evidence in the text",
                "List quantifiable claims the company makes",
            ])
            .rules(&[
                "Use null for missing strings and numbers, [] for missing lists",
                "Never guess or fabricate values",
                "For a single amount set min and max to the same value",
                "For an open-ended amount such as $2M+ set max to null",
            ])
            .output_schema(SCHEMA)
            .build();

        let mut user = format!(
            "Document text (first {} characters):\n\n{}",
            self.max_document_chars,
            truncate_chars(input.text, self.max_document_chars)
        );
        for (i, table) in input.tables.iter().take(MAX_TABLES).enumerate() {
            user.push_str(&format!("\n\nTable {}:\n", i + 1));
            for row in table.iter().take(MAX_TABLE_ROWS) {
                user.push_str(&format!("| {} |\n", row.join(" | ")));
            }
        }
        (system, user)
    }
}

fn parse_profile(value: &Value) -> CandidateProfile {
    CandidateProfile {
        name: json_string(value, "name").unwrap_or_default(),
        sector: json_string(value, "sector"),
        stage: json_string(value, "stage"),
        geography: json_string(value, "geography"),
        funding_ask: FundingAsk::from_json_bounds(
            value.get("ticket_size_min"),
            value.get("ticket_size_max"),
        ),
        summary: json_string(value, "summary"),
        product: json_string(value, "product"),
        website: json_string(value, "website"),
        metadata: CandidateMetadata {
            team: json_string_array(value, "team"),
            traction: json_string(value, "traction"),
            claims: json_string_array(value, "claims"),
        },
    }
}
