//! Stage 2: thesis relevance filtering
//!
//! Candidates are scored in fixed-size batches. Calls inside a batch run
//! concurrently; batches run one after another, with a cancellation check and
//! a progress write between them. A failed score drops only that candidate.

use futures::future::join_all;
use tracing::{info, warn};

use super::cancel::Checkpoint;
use super::tracker::{ProgressTracker, band_percent};
use crate::agents::ScoringAgent;
use crate::constants::progress;
use crate::storage::JobRepository;
use crate::types::{CandidateRecord, InvestmentThesis, Result, SiftError};

/// Counts plus the shortlist, for logs and tests
#[derive(Debug)]
pub struct FilterOutcome {
    pub scored: usize,
    pub failed: usize,
    pub shortlist: Vec<CandidateRecord>,
}

pub struct FilteringStage<'a> {
    pub repo: &'a JobRepository,
    pub scorer: &'a ScoringAgent,
    pub batch_size: usize,
    pub threshold: f64,
    pub shortlist_size: usize,
}

impl FilteringStage<'_> {
    pub async fn run(
        &self,
        thesis: &InvestmentThesis,
        candidates: Vec<CandidateRecord>,
        tracker: &mut ProgressTracker,
        checkpoint: &Checkpoint,
    ) -> Result<FilterOutcome> {
        let batch_size = self.batch_size.max(1);
        let batch_count = candidates.len().div_ceil(batch_size);
        let mut scored = Vec::with_capacity(candidates.len());
        let mut failed = 0;

        for (index, batch) in candidates.chunks(batch_size).enumerate() {
            if index > 0 {
                checkpoint.ensure_active().await?;
            }

            let results = join_all(batch.iter().map(|c| self.scorer.score(c, thesis))).await;
            for (candidate, result) in batch.iter().zip(results) {
                match result {
                    Ok(relevance) => {
                        self.repo.set_relevance(&candidate.id, &relevance).await?;
                        let mut candidate = candidate.clone();
                        candidate.relevance = Some(relevance);
                        scored.push(candidate);
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(candidate = %candidate.name(), error = %e, "Scoring failed, dropping candidate");
                    }
                }
            }

            tracker
                .advance(
                    band_percent(
                        progress::FILTERING_START,
                        progress::FILTERING_END,
                        index + 1,
                        batch_count,
                    ),
                    format!("Scored batch {}/{}", index + 1, batch_count),
                )
                .await?;
        }

        let scored_count = scored.len();
        let shortlist = select_shortlist(scored, self.threshold, self.shortlist_size);
        info!(
            scored = scored_count,
            failed,
            shortlisted = shortlist.len(),
            "Filtering complete"
        );

        if shortlist.is_empty() {
            return Err(SiftError::NoCandidatesMatchedThesis {
                scored: scored_count,
                threshold: self.threshold,
            });
        }
        Ok(FilterOutcome {
            scored: scored_count,
            failed,
            shortlist,
        })
    }
}

/// Keep scores at or above `threshold`, best first, at most `size`.
///
/// Equal scores keep extraction order.
pub fn select_shortlist(
    scored: Vec<CandidateRecord>,
    threshold: f64,
    size: usize,
) -> Vec<CandidateRecord> {
    let mut kept: Vec<CandidateRecord> = scored
        .into_iter()
        .filter(|c| c.relevance_score().is_some_and(|s| s >= threshold))
        .collect();
    kept.sort_by(|a, b| {
        let (sa, sb) = (a.relevance_score().unwrap_or(0.0), b.relevance_score().unwrap_or(0.0));
        sb.total_cmp(&sa)
            .then(a.extraction_order.cmp(&b.extraction_order))
    });
    kept.truncate(size);
    kept
}
