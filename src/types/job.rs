//! Job lifecycle types
//!
//! A job moves forward through
//! `pending -> parsing -> filtering -> dd_running -> aggregating -> completed`.
//! `failed` and `cancelled` are reachable from any non-terminal state, and
//! nothing leaves a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{InvestmentThesis, JobId, SiftError};

// =============================================================================
// Job Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Parsing,
    Filtering,
    DdRunning,
    Aggregating,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Forward chain, in order
    pub const PIPELINE: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Parsing,
        JobStatus::Filtering,
        JobStatus::DdRunning,
        JobStatus::Aggregating,
        JobStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Filtering => "filtering",
            Self::DdRunning => "dd_running",
            Self::Aggregating => "aggregating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn position(&self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| s == self)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed | Self::Cancelled => true,
            _ => match (self.position(), next.position()) {
                (Some(from), Some(to)) => to == from + 1,
                _ => false,
            },
        }
    }

    /// Checked transition
    pub fn transition(self, next: JobStatus) -> Result<JobStatus, SiftError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SiftError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "parsing" => Ok(Self::Parsing),
            "filtering" => Ok(Self::Filtering),
            "dd_running" => Ok(Self::DdRunning),
            "aggregating" => Ok(Self::Aggregating),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(SiftError::Storage(format!("unknown job status '{}'", other))),
        }
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Observable progress of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stage: JobStatus,
    /// 0..=100, never decreases while the job is not failed
    pub percent: u8,
    pub message: String,
}

impl Progress {
    pub fn queued() -> Self {
        Self {
            stage: JobStatus::Pending,
            percent: 0,
            message: "Queued".to_string(),
        }
    }
}

// =============================================================================
// Job
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: JobId,
    pub status: JobStatus,
    /// Screening criteria, immutable once set
    pub thesis: InvestmentThesis,
    pub progress: Progress,
    #[serde(default)]
    pub error_log: Option<String>,
    /// Set by an out-of-process cancel request, observed at the next boundary
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(thesis: InvestmentThesis) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::default(),
            status: JobStatus::Pending,
            thesis,
            progress: Progress::queued(),
            error_log: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }
}
