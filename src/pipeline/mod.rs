//! Job Orchestration Pipeline
//!
//! Drives one job through its four stages and owns every status change.
//!
//! ```text
//! pending → parsing → filtering → dd_running → aggregating → completed
//!    └──────────┴──────────┴────────────┴────────────┴──→ failed | cancelled
//! ```
//!
//! ## Stages
//!
//! 1. **Extraction** (`parsing`, 10→30%): source units to candidate records
//! 2. **Filtering** (`filtering`, 40→50%): thesis relevance, batched
//! 3. **Diligence** (`dd_running`, 60→90%): technical + market, then risk
//! 4. **Aggregation** (`aggregating`, 90%): final ranking, then `completed`
//!
//! Cancellation is cooperative: checked before each stage, between filtering
//! batches and between diligence candidates. Work already started finishes.

mod aggregation;
mod cancel;
mod diligence;
mod extraction;
mod filtering;
mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregation::rank;
pub use cancel::{CancelToken, CancellationRegistry, Checkpoint, SharedRegistry};
pub use diligence::{Assessed, DiligenceStage};
pub use extraction::{ExtractionStage, Ingestors};
pub use filtering::{FilterOutcome, FilteringStage, select_shortlist};
pub use tracker::{ProgressTracker, band_percent};

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::agents::AgentSet;
use crate::ai::{SharedProvider, UsageLedger};
use crate::config::{Config, ModelsConfig, PipelineConfig};
use crate::constants::progress;
use crate::storage::JobRepository;
use crate::types::{Job, JobId, JobStatus, Result, SiftError};

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs jobs against one store, backend and set of ingestors
#[derive(Clone)]
pub struct Orchestrator {
    repo: JobRepository,
    provider: SharedProvider,
    models: ModelsConfig,
    pipeline: PipelineConfig,
    ingestors: Ingestors,
    registry: SharedRegistry,
}

impl Orchestrator {
    pub fn new(
        repo: JobRepository,
        provider: SharedProvider,
        config: &Config,
        ingestors: Ingestors,
        registry: SharedRegistry,
    ) -> Self {
        Self {
            repo,
            provider,
            models: config.models.clone(),
            pipeline: config.pipeline.clone(),
            ingestors,
            registry,
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &JobRepository {
        &self.repo
    }

    /// Run a pending job to a terminal status.
    ///
    /// Stage failures end in `failed` with the error's `error_log`; this only
    /// returns `Err` when the job cannot be loaded or its terminal status
    /// cannot be written. A job that is not pending is left untouched.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: &JobId) -> Result<JobStatus> {
        let job = self.repo.load_job(job_id).await?;
        if job.status != JobStatus::Pending {
            warn!(status = %job.status, "Job is not pending, not running it");
            self.registry.remove(job_id);
            return Ok(job.status);
        }

        let token = self.registry.register(job_id);
        let ledger = Arc::new(UsageLedger::new(job_id.as_str()));
        let agents = AgentSet::new(
            &self.models,
            self.provider.clone(),
            ledger.clone(),
            self.pipeline.max_document_chars,
        );
        let mut tracker = ProgressTracker::new(
            self.repo.clone(),
            job_id.clone(),
            job.status,
            job.progress.percent,
        );
        let checkpoint = Checkpoint::new(job_id.clone(), token, self.repo.clone());

        let finished = match self.execute(&job, &agents, &mut tracker, &checkpoint).await {
            Ok(()) => Ok(()),
            Err(SiftError::Cancelled(_)) => {
                info!(percent = tracker.percent(), "Job cancelled");
                tracker.cancel().await
            }
            Err(e) => {
                error!(stage = %tracker.status(), error = %e, "Job failed");
                match tracker.fail(&e).await {
                    Err(SiftError::Cancelled(_)) => tracker.cancel().await,
                    other => other,
                }
            }
        };

        info!("Usage\n{}", ledger.summary().display());
        self.registry.remove(job_id);
        finished.map(|()| tracker.status())
    }

    async fn execute(
        &self,
        job: &Job,
        agents: &AgentSet,
        tracker: &mut ProgressTracker,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        let job_id = &job.id;

        // ===== Stage 1: Extraction =====
        checkpoint.ensure_active().await?;
        tracker
            .enter(JobStatus::Parsing, progress::PARSING_START, "Extracting candidates")
            .await?;
        let units = self.repo.source_units(job_id).await?;
        let candidates = ExtractionStage {
            repo: &self.repo,
            agent: &agents.extractor,
            ingestors: &self.ingestors,
            concurrency: self.pipeline.extraction_concurrency,
        }
        .run(job_id, units)
        .await?;
        tracker
            .advance(
                progress::PARSING_END,
                format!("Extracted {} candidates", candidates.len()),
            )
            .await?;

        // ===== Stage 2: Filtering =====
        checkpoint.ensure_active().await?;
        tracker
            .enter(
                JobStatus::Filtering,
                progress::FILTERING_START,
                format!("Scoring {} candidates against the thesis", candidates.len()),
            )
            .await?;
        let filtered = FilteringStage {
            repo: &self.repo,
            scorer: &agents.scorer,
            batch_size: self.pipeline.filter_batch_size,
            threshold: self.pipeline.relevance_threshold,
            shortlist_size: self.pipeline.shortlist_size,
        }
        .run(&job.thesis, candidates, tracker, checkpoint)
        .await?;

        // ===== Stage 3: Diligence =====
        checkpoint.ensure_active().await?;
        tracker
            .enter(
                JobStatus::DdRunning,
                progress::DD_START,
                format!(
                    "Deep analysis of {} shortlisted ({} scored, {} failed)",
                    filtered.shortlist.len(),
                    filtered.scored,
                    filtered.failed
                ),
            )
            .await?;
        let assessed = DiligenceStage {
            repo: &self.repo,
            agents,
        }
        .run(job_id, filtered.shortlist, tracker, checkpoint)
        .await?;

        // ===== Stage 4: Aggregation =====
        checkpoint.ensure_active().await?;
        tracker
            .enter(JobStatus::Aggregating, progress::AGGREGATING, "Ranking")
            .await?;
        let results = self.repo.insert_result_set(&rank(job_id, &assessed)).await?;
        tracker
            .enter(
                JobStatus::Completed,
                progress::COMPLETED,
                format!("Ranked {} startups", results.entries.len()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::ai::provider::scripted::ScriptedProvider;
    use crate::config::AgentRole;
    use crate::storage::Table;
    use crate::types::SourceKind;
    use std::sync::OnceLock;
    use std::time::Duration;

    fn scores_by_name(scores: Vec<(String, f64)>) -> ScriptedProvider {
        ScriptedProvider::new(move |req| match req.role {
            AgentRole::Scorer => {
                let name = company(req);
                let score = scores
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, s)| *s)
                    .unwrap_or(0.0);
                score_reply(score)
            }
            role => Ok(evaluator_reply(role)),
        })
    }

    #[tokio::test]
    async fn test_sheet_of_eight_ranks_top_five() {
        let names = names(8);
        let scores = [0.9, 0.8, 0.7, 0.6, 0.55, 0.4, 0.3, 0.1];
        let provider = scores_by_name(names.iter().cloned().zip(scores).collect());
        let h = Harness::new(provider, MapFetcher::default().with("deals.csv", csv(&names)));
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;

        let status = h.orchestrator.run(&id).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = h.repo.load_job(&id).await.unwrap();
        assert_eq!(job.progress.percent, 100);
        assert!(job.error_log.is_none());

        let results = h.repo.result_set(&id).await.unwrap().unwrap();
        let ranked: Vec<&str> = results.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(ranked, &names[..5]);
        assert!(results.ranks_are_dense());
        assert_eq!(results.entries[0].fit_reason, "score 0.9");

        assert_eq!(h.provider.calls_for(AgentRole::Scorer).len(), 8);
        assert_eq!(h.provider.calls_for(AgentRole::Technical).len(), 5);
        assert_eq!(h.provider.calls_for(AgentRole::Risk).len(), 5);
        // Rows without a deck link never reach the extractor
        assert!(h.provider.calls_for(AgentRole::Extractor).is_empty());
        assert_eq!(h.repo.candidates(&id).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unreadable_document_fails_job() {
        let h = Harness::new(
            ScriptedProvider::new(|req| Ok(evaluator_reply(req.role))),
            MapFetcher::default(),
        );
        let id = h.job(&[(SourceKind::Document, "missing.pdf")]).await;

        let status = h.orchestrator.run(&id).await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let job = h.repo.load_job(&id).await.unwrap();
        assert!(job.error_log.unwrap().starts_with("NoCandidatesExtracted"));
        assert!(h.repo.result_set(&id).await.unwrap().is_none());
        assert_eq!(h.provider.call_count(), 0);
        assert!(!h.orchestrator.registry().is_registered(&id));
    }

    #[tokio::test]
    async fn test_failed_evaluator_skips_only_that_candidate() {
        let names = names(3);
        let scored: Vec<(String, f64)> = names.iter().cloned().zip([0.9, 0.8, 0.7]).collect();
        let provider = ScriptedProvider::new(move |req| {
            let name = company(req);
            match req.role {
                AgentRole::Scorer => {
                    let score = scored.iter().find(|(n, _)| *n == name).map(|(_, s)| *s);
                    score_reply(score.unwrap_or(0.0))
                }
                AgentRole::Market if name == "Startup 02" => Ok("no analysis today".to_string()),
                role => Ok(evaluator_reply(role)),
            }
        });
        let h = Harness::new(provider, MapFetcher::default().with("deals.csv", csv(&names)));
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Completed);

        let results = h.repo.result_set(&id).await.unwrap().unwrap();
        let ranked: Vec<&str> = results.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(ranked, vec!["Startup 01", "Startup 03"]);
        assert_eq!(h.repo.assessments(&id).await.unwrap().len(), 2);
        // Risk never runs for the candidate whose market analysis failed
        assert_eq!(h.provider.calls_for(AgentRole::Risk).len(), 2);
    }

    #[tokio::test]
    async fn test_recommendation_outside_enum_skips_candidate() {
        let names = names(3);
        let scored: Vec<(String, f64)> = names.iter().cloned().zip([0.9, 0.8, 0.7]).collect();
        let provider = ScriptedProvider::new(move |req| {
            let name = company(req);
            match req.role {
                AgentRole::Scorer => {
                    let score = scored.iter().find(|(n, _)| *n == name).map(|(_, s)| *s);
                    score_reply(score.unwrap_or(0.0))
                }
                AgentRole::Risk if name == "Startup 02" => {
                    Ok(evaluator_reply(AgentRole::Risk).replace("\"Buy\"", "\"invest now\""))
                }
                role => Ok(evaluator_reply(role)),
            }
        });
        let h = Harness::new(provider, MapFetcher::default().with("deals.csv", csv(&names)));
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Completed);

        let results = h.repo.result_set(&id).await.unwrap().unwrap();
        let ranked: Vec<&str> = results.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(ranked, vec!["Startup 01", "Startup 03"]);
        assert_eq!(h.memory.len(Table::Assessments), 2);
        assert_eq!(h.provider.calls_for(AgentRole::Risk).len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_between_filtering_batches() {
        let token: Arc<OnceLock<CancelToken>> = Arc::new(OnceLock::new());
        let trigger = token.clone();
        let provider = ScriptedProvider::new(move |req| {
            if req.role == AgentRole::Scorer
                && let Some(token) = trigger.get()
            {
                token.cancel();
            }
            Ok(evaluator_reply(req.role))
        });
        let names = names(30);
        let h = Harness::new(provider, MapFetcher::default().with("deals.csv", csv(&names)));
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;
        let _ = token.set(h.orchestrator.registry().register(&id));

        let status = h.orchestrator.run(&id).await.unwrap();
        assert_eq!(status, JobStatus::Cancelled);

        let job = h.repo.load_job(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.progress.percent < progress::DD_START);
        assert_eq!(h.provider.calls_for(AgentRole::Scorer).len(), 10);
        assert!(h.provider.calls_for(AgentRole::Technical).is_empty());
        assert!(h.repo.result_set(&id).await.unwrap().is_none());
        assert!(h.memory.is_empty(Table::ResultSets));
    }

    #[tokio::test]
    async fn test_persisted_cancel_request_stops_before_work() {
        let h = Harness::new(
            ScriptedProvider::new(|req| Ok(evaluator_reply(req.role))),
            MapFetcher::default().with("deals.csv", csv(&names(2))),
        );
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;
        h.repo.request_cancel(&id).await.unwrap();

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Cancelled);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_scoring_failures_are_isolated() {
        let names = names(10);
        let provider = ScriptedProvider::new(|req| {
            let name = company(req);
            match req.role {
                AgentRole::Scorer if ["Startup 02", "Startup 05", "Startup 09"].contains(&name.as_str()) => {
                    Ok("I cannot score this".to_string())
                }
                role => Ok(evaluator_reply(role)),
            }
        })
        .with_delay(Duration::from_millis(5));
        let h = Harness::new(provider, MapFetcher::default().with("deals.csv", csv(&names)));
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Completed);

        let candidates = h.repo.candidates(&id).await.unwrap();
        assert_eq!(candidates.len(), 10);
        assert_eq!(candidates.iter().filter(|c| c.relevance.is_some()).count(), 7);
        assert!(h.provider.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn test_store_write_failure_fails_job() {
        let names = names(2);
        let h = Harness::new(
            ScriptedProvider::new(|req| Ok(evaluator_reply(req.role))),
            MapFetcher::default().with("deals.csv", csv(&names)),
        );
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;
        h.memory.fail_writes_to(Table::Assessments);

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Failed);
        let job = h.repo.load_job(&id).await.unwrap();
        assert!(job.error_log.unwrap().starts_with("StoreWriteError"));
        // The first write failure ends the stage
        assert_eq!(h.provider.calls_for(AgentRole::Risk).len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_above_threshold_fails_job() {
        let names = names(3);
        let provider = scores_by_name(names.iter().cloned().map(|n| (n, 0.2)).collect());
        let h = Harness::new(provider, MapFetcher::default().with("deals.csv", csv(&names)));
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Failed);
        let job = h.repo.load_job(&id).await.unwrap();
        assert!(job.error_log.unwrap().starts_with("NoCandidatesMatchedThesis"));
    }

    #[tokio::test]
    async fn test_only_pending_jobs_run() {
        let h = Harness::new(
            ScriptedProvider::new(|req| Ok(evaluator_reply(req.role))),
            MapFetcher::default().with("deals.csv", csv(&names(1))),
        );
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Completed);
        let calls = h.provider.call_count();
        h.orchestrator.registry().register(&id);
        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Completed);
        assert_eq!(h.provider.call_count(), calls);
        assert!(!h.orchestrator.registry().is_registered(&id));
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    #[tokio::test]
    async fn test_document_and_sheet_keep_submission_order() {
        let provider = ScriptedProvider::new(|req| match req.role {
            AgentRole::Extractor => Ok(r#"{"name": "Deck Co", "sector": "FinTech"}"#.to_string()),
            role => Ok(evaluator_reply(role)),
        })
        .with_delay(Duration::from_millis(5));
        let fetcher = MapFetcher::default()
            .with("deals.csv", csv(&names(2)))
            .with("deck.md", "Deck Co builds payment rails for SMEs.");
        let h = Harness::new(provider, fetcher);
        let id = h
            .job(&[
                (SourceKind::TabularReference, "deals.csv"),
                (SourceKind::Document, "deck.md"),
            ])
            .await;

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Completed);

        let mut candidates = h.repo.candidates(&id).await.unwrap();
        candidates.sort_by_key(|c| c.extraction_order);
        let order: Vec<&str> = candidates.iter().map(|c| c.name()).collect();
        assert_eq!(order, vec!["Startup 01", "Startup 02", "Deck Co"]);

        let units = h.repo.source_units(&id).await.unwrap();
        let parsed = units[1].parse_output.as_ref().unwrap();
        assert!(parsed.plain_text.contains("payment rails"));
        assert!(!parsed.content_sha256.is_empty());
    }

    #[tokio::test]
    async fn test_row_deck_link_merges_over_row_and_falls_back() {
        let provider = ScriptedProvider::new(|req| match req.role {
            AgentRole::Extractor => Ok(r#"{"name": "Linked Co", "stage": "Seed"}"#.to_string()),
            role => Ok(evaluator_reply(role)),
        });
        let sheet = "Company,Sector,Pitch Deck\nRowCo,FinTech,deck.md\nBrokenLink,FinTech,gone.md\n";
        let fetcher = MapFetcher::default()
            .with("deals.csv", sheet)
            .with("deck.md", "Linked Co deck");
        let h = Harness::new(provider, fetcher);
        let id = h.job(&[(SourceKind::TabularReference, "deals.csv")]).await;

        assert_eq!(h.orchestrator.run(&id).await.unwrap(), JobStatus::Completed);

        let mut candidates = h.repo.candidates(&id).await.unwrap();
        candidates.sort_by_key(|c| c.extraction_order);
        assert_eq!(candidates[0].name(), "Linked Co");
        assert_eq!(candidates[0].profile.stage.as_deref(), Some("Seed"));
        assert_eq!(candidates[0].profile.sector.as_deref(), Some("FinTech"));
        assert_eq!(candidates[1].name(), "BrokenLink");
        assert_eq!(h.provider.calls_for(AgentRole::Extractor).len(), 1);
    }
}
