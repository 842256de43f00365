//! Shared fixtures for pipeline and service tests: an in-memory fetcher, a
//! scripted backend keyed by company name, and a wired orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{CancellationRegistry, Ingestors, Orchestrator};
use crate::ai::provider::GenerationRequest;
use crate::ai::provider::scripted::ScriptedProvider;
use crate::config::{AgentRole, Config, PipelineConfig};
use crate::ingest::{CsvSource, DocumentFetcher, PdfParser, SharedFetcher};
use crate::storage::{JobRepository, MemoryStore, SharedStore};
use crate::types::{InvestmentThesis, Job, JobId, Result, SiftError, SourceKind, SourceUnit};

/// Serves fixed bytes per location; anything else is not found
#[derive(Default)]
pub struct MapFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl MapFetcher {
    pub fn with(mut self, location: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(location.to_string(), bytes.into());
        self
    }
}

#[async_trait]
impl DocumentFetcher for MapFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        self.files
            .get(location)
            .cloned()
            .ok_or_else(|| SiftError::ingest(location, "no such file"))
    }
}

/// CSV with a name and sector column, one row per name
pub fn csv(names: &[String]) -> Vec<u8> {
    let mut out = String::from("Company Name,Sector\n");
    for name in names {
        out.push_str(&format!("{},FinTech\n", name));
    }
    out.into_bytes()
}

pub fn names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Startup {:02}", i)).collect()
}

/// Company named on the `Company:` line of a candidate prompt
pub fn company(request: &GenerationRequest) -> String {
    request
        .user_prompt()
        .lines()
        .find_map(|line| line.strip_prefix("Company: "))
        .unwrap_or_default()
        .to_string()
}

/// Well-formed reply for each evaluator role
pub fn evaluator_reply(role: AgentRole) -> String {
    match role {
        AgentRole::Technical => {
            r#"{"overall_assessment": "Sound", "technical_score": 72}"#.to_string()
        }
        AgentRole::Market => r#"{"market_score": 0.6}"#.to_string(),
        AgentRole::Risk => {
            r#"{"risk_heatmap": {"team": "green", "market": "yellow", "tech": "green",
                "financial": "yellow", "execution": "green"},
                "success_rate": 65, "overall_summary": "Reasonable bet", "recommendation": "Buy"}"#
                .to_string()
        }
        AgentRole::Scorer => r#"{"relevance_score": 0.8, "reasoning": "Fits"}"#.to_string(),
        AgentRole::Extractor => r#"{"name": "Extracted Co"}"#.to_string(),
    }
}

pub fn score_reply(score: f64) -> Result<String> {
    Ok(format!(
        r#"{{"relevance_score": {}, "reasoning": "score {}"}}"#,
        score, score
    ))
}

pub struct Harness {
    pub memory: Arc<MemoryStore>,
    pub repo: JobRepository,
    pub provider: Arc<ScriptedProvider>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(provider: ScriptedProvider, fetcher: MapFetcher) -> Self {
        Self::with_pipeline(provider, fetcher, PipelineConfig::default())
    }

    pub fn with_pipeline(
        provider: ScriptedProvider,
        fetcher: MapFetcher,
        pipeline: PipelineConfig,
    ) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        let repo = JobRepository::new(store);
        let provider = Arc::new(provider);

        let fetcher: SharedFetcher = Arc::new(fetcher);
        let ingestors = Ingestors {
            tabular: Arc::new(CsvSource::new(fetcher.clone())),
            parser: Arc::new(PdfParser),
            fetcher,
        };
        let config = Config {
            pipeline,
            ..Config::default()
        };
        let orchestrator = Orchestrator::new(
            repo.clone(),
            provider.clone(),
            &config,
            ingestors,
            Arc::new(CancellationRegistry::new()),
        );
        Self {
            memory,
            repo,
            provider,
            orchestrator,
        }
    }

    /// Persist a pending job with the given sources
    pub async fn job(&self, sources: &[(SourceKind, &str)]) -> JobId {
        let job = self
            .repo
            .create_job(&Job::new(InvestmentThesis {
                sector: Some("FinTech".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        for (position, (kind, location)) in sources.iter().enumerate() {
            self.repo
                .add_source_unit(&SourceUnit::new(
                    job.id.clone(),
                    position as u32,
                    *kind,
                    *location,
                ))
                .await
                .unwrap();
        }
        job.id
    }
}
