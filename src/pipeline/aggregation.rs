//! Stage 4: final ranking
//!
//! Order: success probability descending, then relevance descending, then
//! extraction order ascending. Ranks are dense from 1.

use chrono::Utc;

use super::diligence::Assessed;
use crate::types::{JobId, RankedEntry, ResultSet};

pub fn rank(job_id: &JobId, assessed: &[Assessed]) -> ResultSet {
    let mut ordered: Vec<&Assessed> = assessed.iter().collect();
    ordered.sort_by(|a, b| {
        let relevance = |x: &Assessed| x.candidate.relevance_score().unwrap_or(0.0);
        b.assessment
            .risk
            .success_probability
            .total_cmp(&a.assessment.risk.success_probability)
            .then(relevance(b).total_cmp(&relevance(a)))
            .then(a.candidate.extraction_order.cmp(&b.candidate.extraction_order))
    });

    let entries = ordered
        .into_iter()
        .enumerate()
        .map(|(i, a)| RankedEntry {
            rank: i as u32 + 1,
            candidate_id: a.candidate.id.clone(),
            assessment_id: a.assessment.id.clone(),
            name: a.candidate.name().to_string(),
            success_probability: a.assessment.risk.success_probability,
            relevance_score: a.candidate.relevance_score().unwrap_or(0.0),
            recommendation: a.assessment.risk.recommendation,
            fit_reason: a
                .candidate
                .relevance_rationale()
                .unwrap_or_default()
                .to_string(),
            summary: a.assessment.risk.summary.clone(),
        })
        .collect();

    ResultSet {
        id: String::new(),
        job_id: job_id.clone(),
        entries,
        created_at: Utc::now(),
    }
}
