//! Stage 3: deep analysis of the shortlist
//!
//! One candidate at a time. Per candidate the technical and market agents run
//! concurrently and are joined before the risk agent starts; if either fails
//! the other is dropped with it. Only a fully consistent [`Assessment`] is
//! persisted.

use tracing::{info, warn};

use super::cancel::Checkpoint;
use super::tracker::{ProgressTracker, band_percent};
use crate::agents::{AgentSet, RiskInput};
use crate::constants::progress;
use crate::storage::JobRepository;
use crate::types::{Assessment, CandidateRecord, JobId, Result, SiftError};

/// A candidate that made it through deep analysis
#[derive(Debug, Clone)]
pub struct Assessed {
    pub candidate: CandidateRecord,
    pub assessment: Assessment,
}

pub struct DiligenceStage<'a> {
    pub repo: &'a JobRepository,
    pub agents: &'a AgentSet,
}

impl DiligenceStage<'_> {
    pub async fn run(
        &self,
        job_id: &JobId,
        shortlist: Vec<CandidateRecord>,
        tracker: &mut ProgressTracker,
        checkpoint: &Checkpoint,
    ) -> Result<Vec<Assessed>> {
        let total = shortlist.len();
        let mut assessed = Vec::with_capacity(total);

        for (index, candidate) in shortlist.into_iter().enumerate() {
            if index > 0 {
                checkpoint.ensure_active().await?;
            }

            match self.assess(job_id, &candidate).await {
                Ok(assessment) => {
                    let assessment = self.repo.insert_assessment(&assessment).await?;
                    assessed.push(Assessed {
                        candidate,
                        assessment,
                    });
                }
                Err(e) => {
                    warn!(candidate = %candidate.name(), error = %e, "Deep analysis failed, skipping candidate");
                }
            }

            tracker
                .advance(
                    band_percent(progress::DD_START, progress::DD_END, index + 1, total),
                    format!("Analyzed {}/{}", index + 1, total),
                )
                .await?;
        }

        info!(shortlisted = total, assessed = assessed.len(), "Deep analysis complete");
        Ok(assessed)
    }

    async fn assess(&self, job_id: &JobId, candidate: &CandidateRecord) -> Result<Assessment> {
        let (technical, market) = tokio::try_join!(
            self.agents.technical.evaluate(candidate),
            self.agents.market.evaluate(candidate),
        )?;

        let risk = self
            .agents
            .risk
            .evaluate(
                candidate,
                RiskInput {
                    technical: &technical,
                    market: &market,
                    relevance: candidate.relevance.as_ref(),
                },
            )
            .await?;

        Assessment::assemble(job_id.clone(), candidate.id.clone(), technical, market, risk).map_err(
            |e| match e {
                SiftError::Evaluation {
                    evaluator,
                    message,
                    raw,
                    ..
                } => SiftError::Evaluation {
                    evaluator,
                    candidate: candidate.name().to_string(),
                    message,
                    raw,
                },
                other => other,
            },
        )
    }
}
