//! Results Command

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, parse_job_id};
use crate::service::completed_results;
use crate::types::Result;

pub async fn run(job_id: &str, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let results = completed_results(&ctx.repo, &parse_job_id(job_id)?).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        Output::new().ranking(&results);
    }
    Ok(())
}
