use console::style;

use crate::types::{Job, JobStatus, Recommendation, ResultSet};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(60));
    }

    /// Terminal outcome of a job, with its error log when it failed
    pub fn outcome(&self, job: &Job) {
        match job.status {
            JobStatus::Completed => self.success(&format!("Job {} completed", job.id)),
            JobStatus::Cancelled => self.warning(&format!("Job {} cancelled", job.id)),
            JobStatus::Failed => self.error(&format!(
                "Job {} failed: {}",
                job.id,
                job.error_log.as_deref().unwrap_or("no error recorded")
            )),
            status => self.info(&format!("Job {} is {}", job.id, status)),
        }
    }

    pub fn job_row(&self, job: &Job) {
        println!(
            "{}  {:<12} {:>3}%  {}",
            style(&job.id).bold(),
            job.status.as_str(),
            job.progress.percent,
            job.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    pub fn ranking(&self, results: &ResultSet) {
        self.section(&format!("Ranking ({} startups)", results.entries.len()));
        if results.is_empty() {
            println!("No startup survived deep analysis.");
            return;
        }
        for e in &results.entries {
            println!(
                "{:>2}. {:<28} success {:>5.1}%  relevance {:.2}  {}",
                e.rank,
                e.name,
                e.success_probability,
                e.relevance_score,
                recommendation(e.recommendation)
            );
            if !e.summary.is_empty() {
                println!("    {}", style(&e.summary).dim());
            }
        }
    }
}

fn recommendation(r: Recommendation) -> String {
    match r {
        Recommendation::StrongBuy | Recommendation::Buy => style(r.as_str()).green().to_string(),
        Recommendation::Hold => style(r.as_str()).yellow().to_string(),
        Recommendation::Pass => style(r.as_str()).red().to_string(),
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
