//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::create_provider;
use crate::config::{Config, ConfigLoader};
use crate::constants;
use crate::ingest::Location;
use crate::pipeline::{CancellationRegistry, Ingestors, Orchestrator};
use crate::service::JobService;
use crate::storage::{Database, JobRepository, SharedStore};
use crate::types::{JobId, Result, SiftError};

/// Command execution context
///
/// Config plus an opened record store. The backend client is only built by
/// [`CommandContext::service`], so read-only commands work without an API key.
#[derive(Clone)]
pub struct CommandContext {
    pub data_dir: PathBuf,
    pub config: Config,
    pub repo: JobRepository,
}

impl CommandContext {
    /// Validates initialization, loads config and opens the database.
    pub fn load() -> Result<Self> {
        let data_dir = require_initialized()?;
        let config = ConfigLoader::load()?;

        let db = Database::open(&config.storage.path)?;
        db.initialize()?;
        let store: SharedStore = Arc::new(db);

        Ok(Self {
            data_dir,
            config,
            repo: JobRepository::new(store),
        })
    }

    /// Job service wired to the configured backend
    pub fn service(&self) -> Result<JobService> {
        let provider = create_provider(&self.config.llm)?;
        let ingestors = Ingestors::from_config(&self.config.pipeline)?;
        let orchestrator = Orchestrator::new(
            self.repo.clone(),
            provider,
            &self.config,
            ingestors,
            Arc::new(CancellationRegistry::new()),
        );
        Ok(JobService::new(orchestrator))
    }

    /// Default location for rendered reports
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}

/// `.dealsift` if it exists, `SiftError::NotInitialized` otherwise
pub fn require_initialized() -> Result<PathBuf> {
    let data_dir = Path::new(constants::storage::DATA_DIR);
    if !data_dir.exists() {
        return Err(SiftError::NotInitialized);
    }
    Ok(data_dir.to_path_buf())
}

pub fn is_initialized() -> bool {
    Path::new(constants::storage::DATA_DIR).exists()
}

pub fn parse_job_id(raw: &str) -> Result<JobId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SiftError::InvalidRequest("job id is empty".to_string()));
    }
    Ok(JobId::new(trimmed))
}

/// Expand glob patterns in local document arguments.
///
/// URLs and plain paths pass through unchanged; a pattern that matches
/// nothing is an error rather than an empty submission.
pub fn expand_documents(args: &[String]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for arg in args {
        let is_pattern = arg.contains(['*', '?', '[']);
        let is_remote = matches!(Location::resolve(arg), Ok(Location::Remote(_)));
        if !is_pattern || is_remote {
            out.push(arg.clone());
            continue;
        }

        let paths = glob::glob(arg)
            .map_err(|e| SiftError::InvalidRequest(format!("bad pattern '{}': {}", arg, e)))?;
        let mut matched: Vec<String> = paths
            .filter_map(|p| p.ok())
            .filter(|p| p.is_file())
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        if matched.is_empty() {
            return Err(SiftError::InvalidRequest(format!(
                "no documents match '{}'",
                arg
            )));
        }
        matched.sort();
        out.extend(matched);
    }
    Ok(out)
}
