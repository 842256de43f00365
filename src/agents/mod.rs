//! Pipeline Agents
//!
//! One agent per backend role. Each is built with the provider, its own
//! [`ModelRoute`] and the job's usage ledger; none of them hold mutable state,
//! so an agent call is a pure function of its inputs plus the backend reply.
//!
//! - [`ExtractionAgent`]: document text to [`CandidateProfile`](crate::types::CandidateProfile)
//! - [`ScoringAgent`]: candidate + thesis to [`RelevanceScore`](crate::types::RelevanceScore)
//! - [`TechnicalAgent`], [`MarketAgent`]: independent deep-analysis fragments
//! - [`RiskAgent`]: synthesis over both fragments and the relevance rationale

mod extractor;
mod market;
mod risk;
mod scorer;
mod technical;

pub use extractor::{ExtractionAgent, ExtractionInput};
pub use market::MarketAgent;
pub use risk::{RiskAgent, RiskInput};
pub use scorer::{ScoringAgent, normalize_relevance};
pub use technical::TechnicalAgent;

use serde_json::Value;
use tracing::debug;

use crate::ai::{GenerationRequest, SharedLedger, SharedProvider, extract_structured};
use crate::config::{AgentRole, ModelRoute, ModelsConfig};
use crate::types::{Result, SiftError, json_f64_opt};

/// Provider, route and ledger for one role
#[derive(Clone)]
pub struct AgentContext {
    role: AgentRole,
    route: ModelRoute,
    provider: SharedProvider,
    ledger: SharedLedger,
}

impl AgentContext {
    pub fn new(
        role: AgentRole,
        models: &ModelsConfig,
        provider: SharedProvider,
        ledger: SharedLedger,
    ) -> Self {
        Self {
            role,
            route: models.route(role).clone(),
            provider,
            ledger,
        }
    }

    /// Send one system/user exchange and parse the reply as a JSON object.
    ///
    /// Backend failures and unparseable replies are returned as-is; callers
    /// rewrap them into their stage's per-item error.
    async fn call(&self, system: String, user: String) -> Result<Value> {
        let request = GenerationRequest::new(self.role, &self.route, system, user);
        debug!(
            role = %self.role,
            model = %request.model,
            prompt_chars = request.user_prompt().len(),
            "Calling backend"
        );

        let response = match self.provider.generate(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.ledger.record_failure(self.role);
                return Err(e);
            }
        };

        if response.content.trim().is_empty() {
            self.ledger.record_failure(self.role);
            return Err(SiftError::MalformedOutput {
                message: "empty completion".to_string(),
                raw: String::new(),
            });
        }

        self.ledger.record(self.role, &response);
        extract_structured(&response.content)
    }
}

/// Every role, wired against one provider and ledger
#[derive(Clone)]
pub struct AgentSet {
    pub extractor: ExtractionAgent,
    pub scorer: ScoringAgent,
    pub technical: TechnicalAgent,
    pub market: MarketAgent,
    pub risk: RiskAgent,
}

impl AgentSet {
    pub fn new(
        models: &ModelsConfig,
        provider: SharedProvider,
        ledger: SharedLedger,
        max_document_chars: usize,
    ) -> Self {
        let ctx = |role| AgentContext::new(role, models, provider.clone(), ledger.clone());
        Self {
            extractor: ExtractionAgent::new(ctx(AgentRole::Extractor), max_document_chars),
            scorer: ScoringAgent::new(ctx(AgentRole::Scorer)),
            technical: TechnicalAgent::new(ctx(AgentRole::Technical)),
            market: MarketAgent::new(ctx(AgentRole::Market)),
            risk: RiskAgent::new(ctx(AgentRole::Risk)),
        }
    }
}

/// 0..=100 score from evaluator output. Fractions strictly between 0 and 1
/// are scaled up; 0 and 1 are read as percentages. A missing value falls
/// back to `default`. Range is checked on assembly.
pub(crate) fn percent_score(value: &Value, key: &str, default: f64) -> f64 {
    match json_f64_opt(value, key) {
        Some(v) if v > 0.0 && v < 1.0 => v * 100.0,
        Some(v) => v,
        None => default,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::ai::UsageLedger;
    use crate::ai::provider::scripted::ScriptedProvider;

    #[tokio::test]
    async fn test_call_records_usage_and_strips_fences() {
        let provider = replying("```json\n{\"ok\": true}\n```");
        let ledger = Arc::new(UsageLedger::new("job"));
        let ctx = AgentContext::new(
            AgentRole::Scorer,
            &ModelsConfig::default(),
            provider.clone(),
            ledger.clone(),
        );

        let value = ctx.call("sys".into(), "user".into()).await.unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(provider.calls_for(AgentRole::Scorer), vec!["user"]);

        let summary = ledger.summary();
        assert_eq!(summary.roles[1].calls, 1);
        assert_eq!(summary.total_tokens(), 15);
    }

    #[tokio::test]
    async fn test_call_failure_is_recorded() {
        let provider = Arc::new(ScriptedProvider::new(|_| Ok("   ".to_string())));
        let ctx = context(AgentRole::Risk, provider);
        let err = ctx.call("s".into(), "u".into()).await.unwrap_err();
        assert!(matches!(err, SiftError::MalformedOutput { .. }));
        assert_eq!(ctx.ledger.summary().roles[4].failures, 1);
    }

    #[test]
    fn test_percent_score() {
        let v = json!({"a": 0.72, "b": 64, "c": "81%", "d": 130, "one": 1, "zero": 0, "unit": 1.0});
        assert!((percent_score(&v, "a", 50.0) - 72.0).abs() < 1e-9);
        assert_eq!(percent_score(&v, "b", 50.0), 64.0);
        assert_eq!(percent_score(&v, "c", 50.0), 81.0);
        assert_eq!(percent_score(&v, "d", 50.0), 130.0);
        assert_eq!(percent_score(&v, "missing", 50.0), 50.0);
        assert_eq!(percent_score(&v, "one", 50.0), 1.0);
        assert_eq!(percent_score(&v, "unit", 50.0), 1.0);
        assert_eq!(percent_score(&v, "zero", 50.0), 0.0);
    }
}
