//! Unified Error Type System
//!
//! Centralized error types for the whole pipeline.
//!
//! ## Error Taxonomy
//!
//! - **Per-item** (`Extraction`, `Scoring`, `Evaluation`): the failing unit or
//!   candidate is dropped and logged, siblings keep going
//! - **Stage-fatal** (`NoCandidatesExtracted`, `NoCandidatesMatchedThesis`):
//!   the job transitions to `failed`
//! - **Infrastructure-fatal** (`StoreWrite`): persisting pipeline state failed,
//!   the job transitions to `failed`
//! - **Backend** (`Llm`, `Timeout`): mapped to the per-item error of the stage
//!   that issued the call
//!
//! Backend failures carry an [`ErrorCategory`] so the retry layer can decide
//! whether another attempt makes sense.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Backend error categories for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed - fail fast
    Auth,
    /// Network/connectivity issues
    Network,
    /// Backend unavailable
    Unavailable,
    /// Invalid request - don't retry
    BadRequest,
    /// Response could not be parsed
    ParseError,
    /// Temporary server issues
    Transient,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Whether a second attempt against the same backend may succeed.
    ///
    /// Parse failures are not retried here: the orchestrator treats malformed
    /// output as a per-item failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Transient)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Classified backend error with retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw backend failures onto [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an HTTP status from the backend
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 402 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 422 => LlmError::with_provider(ErrorCategory::BadRequest, message, provider),
            408 => LlmError::with_provider(ErrorCategory::Network, message, provider),
            500 | 502 | 503 | 504 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> LlmError {
        if err.is_timeout() || err.is_connect() {
            LlmError::with_provider(ErrorCategory::Network, err.to_string(), provider)
                .retry_after(Duration::from_secs(5))
        } else if let Some(status) = err.status() {
            Self::classify_http_status(status.as_u16(), &err.to_string(), provider)
        } else if err.is_decode() {
            LlmError::with_provider(ErrorCategory::ParseError, err.to_string(), provider)
        } else if err.is_request() {
            LlmError::with_provider(ErrorCategory::Network, err.to_string(), provider)
        } else {
            LlmError::with_provider(ErrorCategory::Unknown, err.to_string(), provider)
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SiftError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    /// Classified backend failure
    #[error("Backend error: {0}")]
    Llm(LlmError),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Backend answered, but the text could not be read as structured output
    #[error("Malformed structured output: {message}")]
    MalformedOutput { message: String, raw: String },

    // -------------------------------------------------------------------------
    // Per-item Errors
    // -------------------------------------------------------------------------
    #[error("Extraction failed for {unit}: {message}")]
    Extraction {
        unit: String,
        message: String,
        raw: Option<String>,
    },

    #[error("Scoring failed for {candidate}: {message}")]
    Scoring {
        candidate: String,
        message: String,
        raw: Option<String>,
    },

    #[error("{evaluator} evaluation failed for {candidate}: {message}")]
    Evaluation {
        evaluator: String,
        candidate: String,
        message: String,
        raw: Option<String>,
    },

    // -------------------------------------------------------------------------
    // Stage-fatal Errors
    // -------------------------------------------------------------------------
    #[error("no candidate could be extracted from {units} source unit(s)")]
    NoCandidatesExtracted { units: usize },

    #[error("none of {scored} scored candidate(s) reached relevance {threshold}")]
    NoCandidatesMatchedThesis { scored: usize, threshold: f64 },

    #[error("failed to persist {what}: {message}")]
    StoreWrite { what: String, message: String },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Ingest error for {location}: {message}")]
    Ingest { location: String, message: String },

    #[error("Invalid job transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {0} was cancelled")]
    Cancelled(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'dealsift init' first")]
    NotInitialized,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<LlmError> for SiftError {
    fn from(err: LlmError) -> Self {
        SiftError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, SiftError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl SiftError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn store_write(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn ingest(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ingest {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Stable taxonomy name written into a failed job's error log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction { .. } => "ExtractionError",
            Self::Scoring { .. } => "ScoringError",
            Self::Evaluation { .. } => "EvaluationError",
            Self::NoCandidatesExtracted { .. } => "NoCandidatesExtracted",
            Self::NoCandidatesMatchedThesis { .. } => "NoCandidatesMatchedThesis",
            Self::StoreWrite { .. } | Self::Database(_) | Self::Pool(_) | Self::Storage(_) => {
                "StoreWriteError"
            }
            Self::Llm(_) | Self::Http(_) => "BackendUnavailable",
            Self::Timeout { .. } => "Timeout",
            Self::MalformedOutput { .. } => "MalformedOutput",
            Self::Cancelled(_) => "Cancelled",
            _ => "InternalError",
        }
    }

    /// Human-readable line for `Job.error_log`
    pub fn error_log(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }

    /// Raw backend text attached to the error, if any
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::MalformedOutput { raw, .. } => Some(raw),
            Self::Extraction { raw, .. }
            | Self::Scoring { raw, .. }
            | Self::Evaluation { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }

    /// Whether the retry layer may attempt the call again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Rewrap a backend or parse failure as an extraction failure for `unit`
    pub fn into_extraction(self, unit: impl Into<String>) -> Self {
        match self {
            Self::Extraction { .. } => self,
            other => {
                let raw = other.raw_output().map(str::to_string);
                Self::Extraction {
                    unit: unit.into(),
                    message: other.to_string(),
                    raw,
                }
            }
        }
    }

    /// Rewrap a backend or parse failure as a scoring failure for `candidate`
    pub fn into_scoring(self, candidate: impl Into<String>) -> Self {
        match self {
            Self::Scoring { .. } => self,
            other => {
                let raw = other.raw_output().map(str::to_string);
                Self::Scoring {
                    candidate: candidate.into(),
                    message: other.to_string(),
                    raw,
                }
            }
        }
    }

    /// Rewrap a backend or parse failure as an evaluation failure
    pub fn into_evaluation(self, evaluator: impl Into<String>, candidate: impl Into<String>) -> Self {
        match self {
            Self::Evaluation { .. } => self,
            other => {
                let raw = other.raw_output().map(str::to_string);
                Self::Evaluation {
                    evaluator: evaluator.into(),
                    candidate: candidate.into(),
                    message: other.to_string(),
                    raw,
                }
            }
        }
    }
}

/// Context extension trait for persistence paths
pub trait ResultExt<T> {
    /// Map any error into [`SiftError::StoreWrite`] naming what was being written
    fn store_context<C: Into<String>>(self, what: C) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn store_context<C: Into<String>>(self, what: C) -> Result<T> {
        self.map_err(|e| match e {
            SiftError::StoreWrite { .. } => e,
            other => SiftError::store_write(what, other.to_string()),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::ParseError.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "test");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "test");
        assert_eq!(auth.category, ErrorCategory::Auth);

        let server_error = ErrorClassifier::classify_http_status(502, "Bad gateway", "test");
        assert_eq!(server_error.category, ErrorCategory::Transient);
        assert!(server_error.is_retryable());
    }

    #[test]
    fn test_rate_limit_carries_wait_hint() {
        let err = ErrorClassifier::classify_http_status(429, "slow down", "openrouter");
        assert_eq!(err.retry_after, Some(Duration::from_secs(30)));

        let auth = ErrorClassifier::classify_http_status(402, "no credits", "openrouter");
        assert_eq!(auth.retry_after, None);
        assert!(!auth.is_retryable());
    }

    #[test]
    fn test_kind_names_for_error_log() {
        let err = SiftError::NoCandidatesExtracted { units: 3 };
        assert_eq!(err.kind(), "NoCandidatesExtracted");
        assert!(err.error_log().starts_with("NoCandidatesExtracted: "));

        let err = SiftError::NoCandidatesMatchedThesis {
            scored: 4,
            threshold: 0.5,
        };
        assert!(err.error_log().contains("NoCandidatesMatchedThesis"));

        let err = SiftError::store_write("candidate", "disk full");
        assert_eq!(err.kind(), "StoreWriteError");
    }

    #[test]
    fn test_rewrap_keeps_raw_text() {
        let err = SiftError::MalformedOutput {
            message: "expected object".to_string(),
            raw: "not json".to_string(),
        };
        let wrapped = err.into_scoring("Acme");
        assert_eq!(wrapped.kind(), "ScoringError");
        assert_eq!(wrapped.raw_output(), Some("not json"));

        let timeout = SiftError::timeout("technical", Duration::from_secs(90));
        let wrapped = timeout.into_evaluation("technical", "Acme");
        assert_eq!(wrapped.kind(), "EvaluationError");
        assert!(wrapped.to_string().contains("Timeout"));
    }

    #[test]
    fn test_store_context_maps_errors() {
        let res: Result<()> = Err(SiftError::Storage("locked".to_string()));
        let mapped = res.store_context("job").unwrap_err();
        assert!(matches!(mapped, SiftError::StoreWrite { ref what, .. } if what == "job"));
    }

    #[test]
    fn test_llm_error_display() {
        let err =
            LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openrouter");
        assert_eq!(err.to_string(), "[openrouter:RATE_LIMIT] Too many requests");
    }
}
