//! Final ranked output of a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CandidateId, JobId, Recommendation};

/// One ranked shortlist entry with the assessment summary needed for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Dense, 1-based
    pub rank: u32,
    pub candidate_id: CandidateId,
    pub assessment_id: String,
    pub name: String,
    pub success_probability: f64,
    pub relevance_score: f64,
    pub recommendation: Recommendation,
    /// Relevance rationale from filtering
    pub fit_reason: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub id: String,
    pub job_id: JobId,
    pub entries: Vec<RankedEntry>,
    pub created_at: DateTime<Utc>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ranks form exactly 1..=N in order
    pub fn ranks_are_dense(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.rank as usize == i + 1)
    }
}
