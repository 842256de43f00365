//! Cancel Command
//!
//! Sets the persisted cancel marker. A job running in another `dealsift run`
//! stops at its next stage boundary; a job nobody has started is cancelled
//! immediately.

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, parse_job_id};
use crate::service::request_cancel;
use crate::types::{JobStatus, Result};

pub async fn run(job_id: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let job_id = parse_job_id(job_id)?;
    let status = request_cancel(&ctx.repo, &job_id, false).await?;

    let out = Output::new();
    match status {
        JobStatus::Cancelled => out.success(&format!("Job {} cancelled", job_id)),
        s if s.is_terminal() => out.info(&format!("Job {} already {}", job_id, s)),
        s => out.info(&format!(
            "Cancellation requested for job {} ({}); it stops at the next stage boundary",
            job_id, s
        )),
    }
    Ok(())
}
