//! Status Command
//!
//! One job in detail, or every job in the store.

use crate::cli::progress::render_line;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, is_initialized, parse_job_id};
use crate::types::Result;

pub async fn run(job_id: Option<&str>, format: &str) -> Result<()> {
    let json_output = format == "json";

    if !is_initialized() {
        if json_output {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            println!("Not initialized. Run 'dealsift init' first.");
        }
        return Ok(());
    }

    let ctx = CommandContext::load()?;
    let out = Output::new();

    match job_id {
        Some(raw) => {
            let job = ctx.repo.load_job(&parse_job_id(raw)?).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&job)?);
                return Ok(());
            }
            println!("{}", render_line(&job));
            out.outcome(&job);
            if job.cancel_requested && !job.status.is_terminal() {
                out.warning("Cancellation requested, waiting for the next stage boundary");
            }
        }
        None => {
            let mut jobs = ctx.repo.list_jobs().await?;
            jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));
            if json_output {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
                return Ok(());
            }
            out.section(&format!("Jobs ({})", jobs.len()));
            for job in &jobs {
                out.job_row(job);
            }
        }
    }

    Ok(())
}
