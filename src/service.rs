//! Job submission surface
//!
//! `submit` persists the job and its source units, then hands the job to the
//! orchestrator on a tokio task and returns the id immediately. Every other
//! call is a read or a cancel request against the record store.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::Orchestrator;
use crate::storage::JobRepository;
use crate::types::{
    InvestmentThesis, Job, JobId, JobStatus, Progress, Result, ResultSet, SiftError, SourceKind,
    SourceUnit,
};

/// Sources plus thesis, as accepted by `submit`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitRequest {
    pub thesis: InvestmentThesis,
    /// Deck or one-pager locations (paths or URLs)
    pub documents: Vec<String>,
    /// CSV path or Google Sheets link
    pub tabular: Option<String>,
}

impl SubmitRequest {
    pub fn validate(&self) -> Result<()> {
        let has_tabular = self.tabular.as_deref().is_some_and(|t| !t.trim().is_empty());
        if self.documents.is_empty() && !has_tabular {
            return Err(SiftError::InvalidRequest(
                "at least one document or a tabular source is required".to_string(),
            ));
        }
        if let Some(empty) = self.documents.iter().position(|d| d.trim().is_empty()) {
            return Err(SiftError::InvalidRequest(format!(
                "document #{} has an empty location",
                empty
            )));
        }
        self.thesis.validate()
    }

    /// Units in submission order: documents first, then the tabular source
    fn source_units(&self, job_id: &JobId) -> Vec<SourceUnit> {
        let documents = self
            .documents
            .iter()
            .map(|d| (SourceKind::Document, d.trim()));
        let tabular = self
            .tabular
            .iter()
            .map(|t| (SourceKind::TabularReference, t.trim()))
            .filter(|(_, t)| !t.is_empty());

        documents
            .chain(tabular)
            .enumerate()
            .map(|(position, (kind, location))| {
                SourceUnit::new(job_id.clone(), position as u32, kind, location)
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct JobService {
    orchestrator: Orchestrator,
    running: Arc<DashMap<JobId, JoinHandle<Result<JobStatus>>>>,
}

impl JobService {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            running: Arc::new(DashMap::new()),
        }
    }

    fn repo(&self) -> &JobRepository {
        self.orchestrator.repository()
    }

    /// Validate, persist and start a job. Returns before any stage runs.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId> {
        request.validate()?;

        let job = self.repo().create_job(&Job::new(request.thesis.clone())).await?;
        for unit in request.source_units(&job.id) {
            self.repo().add_source_unit(&unit).await?;
        }

        // Handles nobody waited on; `wait` falls back to the stored status
        self.running.retain(|_, handle| !handle.is_finished());

        // Registered before spawning so an immediate cancel reaches the run
        self.orchestrator.registry().register(&job.id);
        let orchestrator = self.orchestrator.clone();
        let job_id = job.id.clone();
        let handle = tokio::spawn(async move { orchestrator.run(&job_id).await });
        self.running.insert(job.id.clone(), handle);

        info!(
            job_id = %job.id,
            documents = request.documents.len(),
            tabular = request.tabular.is_some(),
            "Job submitted"
        );
        Ok(job.id)
    }

    pub async fn status(&self, job_id: &JobId) -> Result<Job> {
        self.repo().load_job(job_id).await
    }

    /// Ranked results of a completed job
    pub async fn results(&self, job_id: &JobId) -> Result<ResultSet> {
        completed_results(self.repo(), job_id).await
    }

    /// Request cancellation; returns the status right after the request.
    ///
    /// A running job stops at its next boundary. A pending job that no
    /// process has started is cancelled here.
    pub async fn cancel(&self, job_id: &JobId) -> Result<JobStatus> {
        let in_process = self.orchestrator.registry().cancel(job_id);
        request_cancel(self.repo(), job_id, in_process).await
    }

    /// Wait for a job started by this service; otherwise report its stored status.
    pub async fn wait(&self, job_id: &JobId) -> Result<JobStatus> {
        match self.running.remove(job_id) {
            Some((_, handle)) => handle.await.map_err(|e| {
                warn!(job_id = %job_id, error = %e, "Job task did not finish");
                SiftError::Storage(format!("job task for {} did not finish: {}", job_id, e))
            })?,
            None => Ok(self.repo().load_job(job_id).await?.status),
        }
    }
}

/// Results exist only once a job has completed
pub async fn completed_results(repo: &JobRepository, job_id: &JobId) -> Result<ResultSet> {
    let job = repo.load_job(job_id).await?;
    if job.status != JobStatus::Completed {
        return Err(SiftError::InvalidRequest(format!(
            "job {} is {}, results exist only for completed jobs",
            job_id, job.status
        )));
    }
    repo.result_set(job_id)
        .await?
        .ok_or_else(|| SiftError::Storage(format!("completed job {} has no result set", job_id)))
}

/// Persist a cancel request. `in_process` says whether a local run was signalled.
pub async fn request_cancel(
    repo: &JobRepository,
    job_id: &JobId,
    in_process: bool,
) -> Result<JobStatus> {
    let job = repo.load_job(job_id).await?;
    if job.status.is_terminal() {
        return Ok(job.status);
    }
    repo.request_cancel(job_id).await?;

    if job.status == JobStatus::Pending && !in_process {
        let status = job.status.transition(JobStatus::Cancelled)?;
        let progress = Progress {
            stage: status,
            percent: job.progress.percent,
            message: "Cancelled before start".to_string(),
        };
        repo.write_status(job_id, status, &progress).await?;
        info!(job_id = %job_id, "Pending job cancelled");
        return Ok(status);
    }

    info!(job_id = %job_id, in_process, "Cancellation requested");
    Ok(job.status)
}
