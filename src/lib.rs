//! dealsift - Startup Screening Pipeline
//!
//! Takes pitch decks, one-pagers and deal sheets, extracts one candidate per
//! startup, scores each against an investment thesis and runs technical,
//! market and risk diligence on the shortlist. The output is a ranked result
//! set persisted next to the job.
//!
//! ## Stages
//!
//! 1. **Extraction**: parse documents and sheet rows into candidates
//! 2. **Filtering**: batched relevance scoring, threshold and shortlist cut
//! 3. **Diligence**: technical and market evaluators in parallel, then risk
//! 4. **Aggregation**: rank by success probability, persist results
//!
//! ## Quick Start
//!
//! ```ignore
//! use dealsift::{ConfigLoader, Database, JobService, Orchestrator, SubmitRequest};
//!
//! let config = ConfigLoader::load()?;
//! let db = Database::open(&config.storage.path)?;
//! db.initialize()?;
//! let repo = JobRepository::new(Arc::new(db));
//! let orchestrator = Orchestrator::new(
//!     repo,
//!     create_provider(&config.llm)?,
//!     &config,
//!     Ingestors::from_config(&config.pipeline)?,
//!     Arc::new(CancellationRegistry::default()),
//! );
//! let service = JobService::new(orchestrator);
//! let job_id = service.submit(request).await?;
//! service.wait(&job_id).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: text-generation backend, throttling, structured output
//! - [`agents`]: extraction, scoring and the three evaluators
//! - [`ingest`]: document parsing and tabular sources
//! - [`pipeline`]: orchestrator, stages, cancellation, progress
//! - [`storage`]: record store abstraction over SQLite
//! - [`service`]: job submission, status, results, cancel

pub mod agents;
pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod service;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, Result, ResultExt, SiftError};

// Domain
pub use types::{
    Assessment, CandidateRecord, InvestmentThesis, Job, JobId, JobStatus, Progress,
    Recommendation, ResultSet, SourceKind, SourceUnit,
};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{Database, JobRepository, MemoryStore, RecordStore, SharedStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{CancellationRegistry, Ingestors, Orchestrator};
pub use service::{JobService, SubmitRequest};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    GenerationRequest, LlmProvider, LlmResponse, OpenRouterProvider, SharedProvider,
    ThrottledProvider, UsageLedger, create_provider,
};
