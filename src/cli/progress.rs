//! Job Progress Display
//!
//! Polls the stored job record and prints a line whenever its stage or
//! percent changes. The orchestrator writes progress to the store, so the
//! same view works for jobs started by another process.

use std::time::Duration;

use console::style;

use crate::service::JobService;
use crate::types::{Job, JobId, JobStatus, Result};

const BAR_WIDTH: usize = 24;

/// Text progress bar, e.g. `[######------]`
pub fn render_bar(percent: u8, width: usize) -> String {
    let filled = width * percent.min(100) as usize / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// One progress line for a job
pub fn render_line(job: &Job) -> String {
    let stage = match job.status {
        JobStatus::Completed => style(job.status.as_str()).green().to_string(),
        JobStatus::Failed | JobStatus::Cancelled => style(job.status.as_str()).red().to_string(),
        _ => style(job.status.as_str()).cyan().to_string(),
    };
    format!(
        "{} {:>3}% {:<12} {}",
        render_bar(job.progress.percent, BAR_WIDTH),
        job.progress.percent,
        stage,
        style(&job.progress.message).dim()
    )
}

/// Print progress until the job reaches a terminal status
pub struct ProgressFollower {
    interval: Duration,
    last: Option<(JobStatus, u8, String)>,
}

impl ProgressFollower {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether `job` differs from the last printed state
    fn changed(&mut self, job: &Job) -> bool {
        let current = (job.status, job.progress.percent, job.progress.message.clone());
        if self.last.as_ref() == Some(&current) {
            return false;
        }
        self.last = Some(current);
        true
    }

    pub async fn follow(&mut self, service: &JobService, job_id: &JobId) -> Result<Job> {
        loop {
            let job = service.status(job_id).await?;
            if self.changed(&job) {
                println!("{}", render_line(&job));
            }
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

impl Default for ProgressFollower {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InvestmentThesis;

    #[test]
    fn test_render_bar() {
        assert_eq!(render_bar(0, 10), "[----------]");
        assert_eq!(render_bar(40, 10), "[####------]");
        assert_eq!(render_bar(100, 10), "[##########]");
        assert_eq!(render_bar(250, 4), "[####]");
    }

    #[test]
    fn test_follower_prints_only_changes() {
        let mut follower = ProgressFollower::default();
        let mut job = Job::new(InvestmentThesis::default());

        assert!(follower.changed(&job));
        assert!(!follower.changed(&job));
        job.progress.percent = 10;
        assert!(follower.changed(&job));
        job.progress.message = "Extracting".to_string();
        assert!(follower.changed(&job));
    }
}
