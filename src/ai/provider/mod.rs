//! Text-Generation Backend Abstraction
//!
//! Defines the `LlmProvider` trait every pipeline role talks to. A request
//! carries its own model route (model, sampling, timeout), so one provider
//! instance serves all roles.
//!
//! ## Modules
//!
//! - `openrouter`: OpenAI-compatible chat-completions client (OpenRouter, OpenAI)
//! - `throttle`: global concurrency cap, per-call timeout and retry policy

mod openrouter;
mod throttle;

#[cfg(test)]
pub mod scripted;

pub use openrouter::OpenRouterProvider;
pub use throttle::ThrottledProvider;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AgentRole, LlmConfig, ModelRoute};
use crate::types::Result;

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One chat-completion call, fully described by the calling role's route
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub role: AgentRole,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn new(
        role: AgentRole,
        route: &ModelRoute,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            role,
            model: route.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens: route.max_tokens,
            temperature: route.temperature,
            timeout: route.timeout(),
        }
    }

    /// The user turn, used by logs and scripted test backends
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

// =============================================================================
// Response with Usage Metrics
// =============================================================================

/// Raw completion text plus usage metrics
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text, possibly fenced; parsed by the caller
    pub content: String,
    pub usage: TokenUsage,
    /// Cost in USD when the backend reports it, otherwise 0
    pub cost_usd: f64,
    pub timing: ResponseTiming,
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    /// Response with content only (usage/cost unknown)
    pub fn content_only(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Wall clock, milliseconds
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub model: String,
    pub provider: String,
}

/// Shared provider handle for concurrent access across pipeline stages.
pub type SharedProvider = Arc<dyn LlmProvider>;

// =============================================================================
// Provider Trait
// =============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat completion and return the raw text.
    ///
    /// Failures are `SiftError::Llm` (classified), `SiftError::Timeout` or
    /// `SiftError::MalformedOutput` for an empty completion.
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Build the configured backend wrapped in the shared throttle.
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    let backend: SharedProvider = Arc::new(OpenRouterProvider::new(config)?);
    Ok(Arc::new(ThrottledProvider::new(backend, config)))
}
