//! Report Command
//!
//! Write the markdown portfolio report of a completed job.

use std::path::{Path, PathBuf};

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, parse_job_id};
use crate::report::render_markdown;
use crate::service::completed_results;
use crate::types::Result;

pub async fn run(job_id: &str, output: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let job_id = parse_job_id(job_id)?;

    let results = completed_results(&ctx.repo, &job_id).await?;
    let job = ctx.repo.load_job(&job_id).await?;
    let assessments = ctx.repo.assessments(&job_id).await?;
    let bytes = render_markdown(&job, &results.entries, &assessments);

    let path: PathBuf = match output {
        Some(path) => path.to_path_buf(),
        None => ctx.reports_dir().join(format!("{}.md", job_id)),
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;

    Output::new().success(&format!("Report written to {}", path.display()));
    Ok(())
}
