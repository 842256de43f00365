pub mod assessment;
pub mod candidate;
pub mod error;
pub mod funding;
pub mod job;
pub mod result;
pub mod source;
pub mod thesis;
pub mod utils;

pub use assessment::{
    Assessment, ClaimCheck, ClaimVerdict, CompetitorMap, FinancialCheck, MarketAssessment,
    MarketSizing, Recommendation, RevenueProjection, RiskAssessment, RiskHeatmap, RiskLevel,
    TechnicalAssessment,
};
pub use candidate::{CandidateMetadata, CandidateProfile, CandidateRecord, RelevanceScore};
pub use error::{ErrorCategory, ErrorClassifier, LlmError, Result, ResultExt, SiftError};
pub use funding::FundingAsk;
pub use job::{Job, JobStatus, Progress};
pub use result::{RankedEntry, ResultSet};
pub use source::{ParsedDocument, SourceKind, SourceUnit};
pub use thesis::InvestmentThesis;
pub use utils::{
    json_f64, json_f64_opt, json_string, json_string_array, json_string_or, preview,
    truncate_chars,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-safe wrapper for job IDs
///
/// Assigned by the record store on insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Type-safe wrapper for candidate IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CandidateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CandidateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
