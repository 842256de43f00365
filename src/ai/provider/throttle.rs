//! Shared call policy for the text-generation backend
//!
//! - **Concurrency cap**: one semaphore bounds in-flight calls across all stages
//! - **Timeout**: every attempt is bounded by the calling route's timeout
//! - **Retry**: exponential backoff via `backon`, only for transient categories
//!   (rate limit, network, 5xx, timeout) and only when `max_retries > 0`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use tokio::sync::Semaphore;
use tracing::warn;

use super::{GenerationRequest, LlmProvider, LlmResponse, SharedProvider};
use crate::ai::timeout::with_timeout;
use crate::config::LlmConfig;
use crate::constants::llm as llm_constants;
use crate::types::{ErrorCategory, LlmError, Result, SiftError};

pub struct ThrottledProvider {
    inner: SharedProvider,
    permits: Arc<Semaphore>,
    max_retries: usize,
    base_delay: Duration,
}

impl ThrottledProvider {
    pub fn new(inner: SharedProvider, config: &LlmConfig) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<LlmResponse> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            LlmError::with_provider(
                ErrorCategory::Unknown,
                "request limiter closed",
                self.inner.name(),
            )
        })?;
        let operation = format!("{} call to {}", request.role, request.model);
        with_timeout(request.timeout, self.inner.generate(request), &operation).await
    }
}

#[async_trait]
impl LlmProvider for ThrottledProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse> {
        if self.max_retries == 0 {
            return self.attempt(request).await;
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(Duration::from_secs(llm_constants::MAX_DELAY_SECS))
            .with_max_times(self.max_retries)
            .with_jitter();

        let this = self;
        (move || this.attempt(request))
            .retry(backoff)
            .when(|e: &SiftError| e.is_retryable())
            .notify(|e: &SiftError, delay: Duration| {
                warn!(
                    role = %request.role,
                    model = %request.model,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying backend call: {}",
                    e
                );
            })
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
