//! Cooperative cancellation
//!
//! Two signals, checked together at every stage boundary and between
//! filtering batches:
//! - an in-process [`CancelToken`] held in the [`CancellationRegistry`]
//! - the persisted `cancel_requested` marker on the job record, for requests
//!   made from another process

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::info;

use crate::storage::JobRepository;
use crate::types::{JobId, Result, SiftError};

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tokens for jobs owned by this process
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: DashMap<JobId, CancelToken>,
}

pub type SharedRegistry = Arc<CancellationRegistry>;

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `job_id`, created on first use
    pub fn register(&self, job_id: &JobId) -> CancelToken {
        self.tokens.entry(job_id.clone()).or_default().clone()
    }

    /// Signal a job owned by this process. Returns false if none is registered.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match self.tokens.get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, job_id: &JobId) -> bool {
        self.tokens.contains_key(job_id)
    }

    pub fn remove(&self, job_id: &JobId) {
        self.tokens.remove(job_id);
    }
}

/// Boundary check for one running job
pub struct Checkpoint {
    job_id: JobId,
    token: CancelToken,
    repo: JobRepository,
}

impl Checkpoint {
    pub fn new(job_id: JobId, token: CancelToken, repo: JobRepository) -> Self {
        Self {
            job_id,
            token,
            repo,
        }
    }

    /// `Err(Cancelled)` once either signal is set
    pub async fn ensure_active(&self) -> Result<()> {
        if self.token.is_cancelled() || self.repo.load_job(&self.job_id).await?.cancel_requested {
            info!(job_id = %self.job_id, "Cancellation observed");
            self.token.cancel();
            return Err(SiftError::Cancelled(self.job_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SharedStore};
    use crate::types::{InvestmentThesis, Job};

    #[test]
    fn test_registry_shares_token() {
        let registry = CancellationRegistry::new();
        let job = JobId::new("j1");
        let token = registry.register(&job);

        assert!(registry.cancel(&job));
        assert!(token.is_cancelled());
        assert!(registry.register(&job).is_cancelled());

        registry.remove(&job);
        assert!(!registry.is_registered(&job));
        assert!(!registry.cancel(&job));
    }

    #[tokio::test]
    async fn test_checkpoint_sees_persisted_request() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let repo = JobRepository::new(store);
        let job = repo.create_job(&Job::new(InvestmentThesis::default())).await.unwrap();
        let checkpoint = Checkpoint::new(job.id.clone(), CancelToken::new(), repo.clone());

        checkpoint.ensure_active().await.unwrap();
        repo.request_cancel(&job.id).await.unwrap();
        let err = checkpoint.ensure_active().await.unwrap_err();
        assert!(matches!(err, SiftError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_checkpoint_sees_token() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let repo = JobRepository::new(store);
        let job = repo.create_job(&Job::new(InvestmentThesis::default())).await.unwrap();
        let token = CancelToken::new();
        let checkpoint = Checkpoint::new(job.id.clone(), token.clone(), repo);

        token.cancel();
        assert!(checkpoint.ensure_active().await.is_err());
    }
}
