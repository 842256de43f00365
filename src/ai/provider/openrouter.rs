//! OpenAI-compatible chat-completions client
//!
//! Serves OpenRouter (default) and OpenAI proper; the wire format is the same.
//! OpenRouter additionally reports per-call cost when usage accounting is
//! requested.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{
    ChatMessage, GenerationRequest, LlmProvider, LlmResponse, ResponseMetadata, ResponseTiming,
    TokenUsage,
};
use crate::config::{LlmConfig, ProviderKind};
use crate::types::{ErrorClassifier, Result, SiftError, preview};

/// Chat-completions client with secure API key handling
pub struct OpenRouterProvider {
    kind: ProviderKind,
    /// Never exposed in logs or debug output
    api_key: SecretString,
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("kind", &self.kind)
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenRouterProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let kind = config.provider;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(kind.api_key_env()).ok())
            .ok_or_else(|| {
                SiftError::Config(format!(
                    "{} API key not found. Set {} or llm.api_key in config",
                    kind,
                    kind.api_key_env()
                ))
            })?;

        let base = config
            .api_base
            .clone()
            .unwrap_or_else(|| kind.default_api_base().to_string());
        let endpoint = format!("{}/chat/completions", base.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SiftError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            kind,
            api_key: SecretString::from(api_key),
            endpoint,
            client,
        })
    }

    fn build_request<'a>(&self, request: &'a GenerationRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            usage: (self.kind == ProviderKind::OpenRouter).then_some(UsageAccounting {
                include: true,
            }),
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse> {
        debug!(
            role = %request.role,
            model = %request.model,
            max_tokens = request.max_tokens,
            "Sending chat completion"
        );

        let start_time = Instant::now();
        let mut builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .timeout(request.timeout)
            .json(&self.build_request(request));
        if self.kind == ProviderKind::OpenRouter {
            builder = builder.header("X-Title", "dealsift");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, self.name()))?;

        let status = response.status();
        if !status.is_success() {
            let wait = retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            let mut err = ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("HTTP {}: {}", status, preview(&body, 300)),
                self.name(),
            );
            if let Some(wait) = wait {
                err = err.retry_after(wait);
            }
            return Err(err.into());
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, self.name()))?;
        let elapsed = start_time.elapsed();

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SiftError::MalformedOutput {
                message: format!("{} returned an empty completion", request.model),
                raw: String::new(),
            })?;

        let (usage, cost_usd) = body
            .usage
            .map(|u| {
                (
                    TokenUsage {
                        input_tokens: u.prompt_tokens,
                        output_tokens: u.completion_tokens,
                    },
                    u.cost.unwrap_or(0.0),
                )
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            cost_usd,
            timing: ResponseTiming::from_duration(elapsed),
            metadata: ResponseMetadata {
                model: body.model.unwrap_or_else(|| request.model.clone()),
                provider: self.kind.to_string(),
            },
        })
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageAccounting>,
}

#[derive(Debug, Serialize)]
struct UsageAccounting {
    include: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    /// OpenRouter usage accounting, in credits (USD)
    #[serde(default)]
    cost: Option<f64>,
}
