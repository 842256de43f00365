//! Job status and progress writer
//!
//! The orchestrator owns exactly one tracker per running job. Every status
//! change goes through [`JobStatus::transition`], and the recorded percent is
//! clamped so it never decreases.

use tracing::{debug, info};

use crate::storage::JobRepository;
use crate::types::{JobId, JobStatus, Progress, Result, SiftError};

pub struct ProgressTracker {
    repo: JobRepository,
    job_id: JobId,
    status: JobStatus,
    percent: u8,
}

impl ProgressTracker {
    pub fn new(repo: JobRepository, job_id: JobId, status: JobStatus, percent: u8) -> Self {
        Self {
            repo,
            job_id,
            status,
            percent,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    fn progress(&self, message: impl Into<String>) -> Progress {
        Progress {
            stage: self.status,
            percent: self.percent,
            message: message.into(),
        }
    }

    /// Move to the next status and record its opening progress
    pub async fn enter(
        &mut self,
        next: JobStatus,
        percent: u8,
        message: impl Into<String>,
    ) -> Result<()> {
        let status = self.status.transition(next)?;
        let previous = (self.status, self.percent);
        self.status = status;
        self.percent = self.percent.max(percent.min(100));

        let progress = self.progress(message);
        if let Err(e) = self
            .repo
            .write_status(&self.job_id, status, &progress)
            .await
        {
            (self.status, self.percent) = previous;
            return Err(e);
        }
        info!(
            job_id = %self.job_id,
            status = %status,
            percent = self.percent,
            "{}",
            progress.message
        );
        Ok(())
    }

    /// Record progress within the current status
    pub async fn advance(&mut self, percent: u8, message: impl Into<String>) -> Result<()> {
        self.percent = self.percent.max(percent.min(100));
        let progress = self.progress(message);
        self.repo.write_progress(&self.job_id, &progress).await?;
        debug!(job_id = %self.job_id, percent = self.percent, "{}", progress.message);
        Ok(())
    }

    /// Terminal failure with the error's taxonomy line as `error_log`
    pub async fn fail(&mut self, error: &SiftError) -> Result<()> {
        let next = self.status.transition(JobStatus::Failed)?;
        self.repo
            .write_failure(&self.job_id, &error.error_log())
            .await?;
        self.status = next;
        Ok(())
    }

    pub async fn cancel(&mut self) -> Result<()> {
        let next = self.status.transition(JobStatus::Cancelled)?;
        let progress = Progress {
            stage: next,
            ..self.progress("Cancelled")
        };
        self.repo
            .write_status(&self.job_id, next, &progress)
            .await?;
        self.status = next;
        Ok(())
    }
}

/// Percent for `done` of `total` units inside a `[start, end]` milestone band
pub fn band_percent(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return end;
    }
    let span = end.saturating_sub(start) as usize;
    start + (span * done.min(total) / total) as u8
}
