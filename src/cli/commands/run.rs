//! Run Command
//!
//! Submit a job and follow it in the foreground until it settles.
//!
//! Usage:
//!   dealsift run decks/*.pdf --sheet deals.csv --sector FinTech --stage Seed
//!   dealsift run --sheet "https://docs.google.com/spreadsheets/d/..." --thesis thesis.json
//!
//! Ctrl-C requests cancellation and waits for the job to stop at its next
//! stage boundary.

use std::path::PathBuf;

use crate::cli::progress::ProgressFollower;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, expand_documents};
use crate::service::{JobService, SubmitRequest};
use crate::types::{InvestmentThesis, Job, JobId, JobStatus, Result, SiftError};

/// Thesis flags; each one overrides the same field of `--thesis`
#[derive(Debug, Clone, Default)]
pub struct ThesisArgs {
    pub file: Option<PathBuf>,
    pub sector: Option<String>,
    pub stage: Option<String>,
    pub geography: Option<String>,
    pub ticket_min: Option<f64>,
    pub ticket_max: Option<f64>,
    pub context: Option<String>,
}

impl ThesisArgs {
    pub fn resolve(&self) -> Result<InvestmentThesis> {
        let mut thesis = match &self.file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str::<InvestmentThesis>(&raw).map_err(|e| {
                    SiftError::InvalidRequest(format!(
                        "thesis file {} is not valid: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            None => InvestmentThesis::default(),
        };

        if self.sector.is_some() {
            thesis.sector = self.sector.clone();
        }
        if self.stage.is_some() {
            thesis.stage = self.stage.clone();
        }
        if self.geography.is_some() {
            thesis.geography = self.geography.clone();
        }
        if self.ticket_min.is_some() {
            thesis.ticket_min = self.ticket_min;
        }
        if self.ticket_max.is_some() {
            thesis.ticket_max = self.ticket_max;
        }
        if self.context.is_some() {
            thesis.context = self.context.clone();
        }
        Ok(thesis)
    }
}

pub struct RunOptions {
    pub documents: Vec<String>,
    pub sheet: Option<String>,
    pub thesis: ThesisArgs,
    /// Submit and return the job id without following it
    pub detach: bool,
}

pub async fn run(options: RunOptions) -> Result<()> {
    let documents = if options.documents.is_empty() {
        Vec::new()
    } else {
        expand_documents(&options.documents)?
    };
    let request = SubmitRequest {
        thesis: options.thesis.resolve()?,
        documents,
        tabular: options.sheet,
    };
    request.validate()?;

    let ctx = CommandContext::load()?;
    let service = ctx.service()?;
    let out = Output::new();

    out.section("Investment thesis");
    println!("{}", request.thesis.describe());

    let job_id = service.submit(request).await?;
    out.info(&format!("Job {} submitted", job_id));

    if options.detach {
        println!("  Follow with: dealsift status {}", job_id);
        return Ok(());
    }

    let job = follow_until_settled(&service, &job_id).await?;
    out.outcome(&job);

    if job.status == JobStatus::Completed {
        let results = service.results(&job_id).await?;
        out.ranking(&results);
        println!();
        println!("  Report: dealsift report {}", job_id);
    }
    Ok(())
}

/// Print progress until the job is terminal. Ctrl-C turns into a cancel request.
async fn follow_until_settled(service: &JobService, job_id: &JobId) -> Result<Job> {
    let mut follower = ProgressFollower::default();

    tokio::select! {
        job = follower.follow(service, job_id) => {
            service.wait(job_id).await?;
            job
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            Output::new().warning("Interrupted, cancelling at the next stage boundary...");
            service.cancel(job_id).await?;
            service.wait(job_id).await?;
            service.status(job_id).await
        }
    }
}
