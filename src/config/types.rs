//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/dealsift/) and project (.dealsift/) level configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::constants;
use crate::types::{Result, SiftError};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Backend connection settings
    pub llm: LlmConfig,

    /// Per-role model routing
    pub models: ModelsConfig,

    /// Stage tuning
    pub pipeline: PipelineConfig,

    /// Record store settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            models: ModelsConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `SiftError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.llm.max_concurrent_requests == 0 {
            return Err(SiftError::Config(
                "llm.max_concurrent_requests must be greater than 0".to_string(),
            ));
        }

        for role in AgentRole::ALL {
            let route = self.models.route(role);
            if route.model.trim().is_empty() {
                return Err(SiftError::Config(format!("models.{}.model is empty", role)));
            }
            if route.timeout_secs == 0 {
                return Err(SiftError::Config(format!(
                    "models.{}.timeout_secs must be greater than 0",
                    role
                )));
            }
            if !(0.0..=2.0).contains(&route.temperature) {
                return Err(SiftError::Config(format!(
                    "models.{}.temperature must be between 0.0 and 2.0, got {}",
                    role, route.temperature
                )));
            }
            if route.max_tokens == 0 {
                return Err(SiftError::Config(format!(
                    "models.{}.max_tokens must be greater than 0",
                    role
                )));
            }
        }

        self.pipeline.validate()
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenRouter,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            Self::OpenRouter => constants::llm::OPENROUTER_API_BASE,
            Self::OpenAi => constants::llm::OPENAI_API_BASE,
        }
    }

    /// Environment variable consulted when no key is configured
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            _ => Err(format!(
                "Unknown provider: {}. Valid values: openrouter, openai",
                s
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,

    /// Override for the chat-completions base URL
    pub api_base: Option<String>,

    /// API key (falls back to the provider's environment variable)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Cap on in-flight backend requests across all stages
    pub max_concurrent_requests: usize,

    /// Retries for transient failures (rate limit, network, 5xx)
    pub max_retries: usize,

    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_base: None,
            api_key: None,
            max_concurrent_requests: constants::llm::MAX_CONCURRENT_REQUESTS,
            max_retries: constants::llm::DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: constants::llm::BASE_DELAY_MS,
        }
    }
}

// =============================================================================
// Model Routing
// =============================================================================

/// Pipeline roles that talk to the text-generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Extractor,
    Scorer,
    Technical,
    Market,
    Risk,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Extractor,
        AgentRole::Scorer,
        AgentRole::Technical,
        AgentRole::Market,
        AgentRole::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extractor => "extractor",
            Self::Scorer => "scorer",
            Self::Technical => "technical",
            Self::Market => "market",
            Self::Risk => "risk",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model and sampling settings for one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRoute {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl ModelRoute {
    fn new(model: &str, max_tokens: u32, temperature: f32, timeout_secs: u64) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            temperature,
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Immutable role-to-model mapping, handed to each agent at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub extractor: ModelRoute,
    pub scorer: ModelRoute,
    pub technical: ModelRoute,
    pub market: ModelRoute,
    pub risk: ModelRoute,
}

impl ModelsConfig {
    pub fn route(&self, role: AgentRole) -> &ModelRoute {
        match role {
            AgentRole::Extractor => &self.extractor,
            AgentRole::Scorer => &self.scorer,
            AgentRole::Technical => &self.technical,
            AgentRole::Market => &self.market,
            AgentRole::Risk => &self.risk,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            extractor: ModelRoute::new("qwen/qwen3-30b-a3b-instruct-2507", 1500, 0.3, 30),
            scorer: ModelRoute::new("openai/gpt-4o-mini", 500, 0.3, 30),
            technical: ModelRoute::new("deepseek/deepseek-chat-v3.1", 1500, 0.4, 90),
            market: ModelRoute::new("google/gemini-2.5-flash-lite-preview-09-2025", 1500, 0.4, 90),
            risk: ModelRoute::new("x-ai/grok-4-fast", 1500, 0.5, 60),
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent units/rows during extraction
    pub extraction_concurrency: usize,

    /// Candidates scored concurrently per batch
    pub filter_batch_size: usize,

    /// Minimum relevance (inclusive) to stay in consideration
    pub relevance_threshold: f64,

    /// Candidates advancing to deep analysis
    pub shortlist_size: usize,

    /// Leading characters of a document sent to the extractor
    pub max_document_chars: usize,

    /// Timeout for fetching remote documents and sheets
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extraction_concurrency: constants::pipeline::EXTRACTION_CONCURRENCY,
            filter_batch_size: constants::pipeline::FILTER_BATCH_SIZE,
            relevance_threshold: constants::pipeline::RELEVANCE_THRESHOLD,
            shortlist_size: constants::pipeline::SHORTLIST_SIZE,
            max_document_chars: constants::pipeline::MAX_DOCUMENT_CHARS,
            fetch_timeout_secs: constants::pipeline::FETCH_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(SiftError::Config(format!(
                "pipeline.relevance_threshold must be between 0.0 and 1.0, got {}",
                self.relevance_threshold
            )));
        }
        for (name, value) in [
            ("extraction_concurrency", self.extraction_concurrency),
            ("filter_batch_size", self.filter_batch_size),
            ("shortlist_size", self.shortlist_size),
            ("max_document_chars", self.max_document_chars),
        ] {
            if value == 0 {
                return Err(SiftError::Config(format!(
                    "pipeline.{} must be greater than 0",
                    name
                )));
            }
        }
        if self.fetch_timeout_secs == 0 {
            return Err(SiftError::Config(
                "pipeline.fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::storage::DATA_DIR).join(constants::storage::DB_FILE),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
