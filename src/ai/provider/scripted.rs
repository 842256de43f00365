//! Deterministic backend for tests: answers come from a closure over the request.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{GenerationRequest, LlmProvider, LlmResponse, TokenUsage};
use crate::config::AgentRole;
use crate::types::Result;

type Handler = Box<dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync>;

pub struct ScriptedProvider {
    handler: Handler,
    delay: Option<Duration>,
    calls: Mutex<Vec<(AgentRole, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, role: AgentRole) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.role, request.user_prompt().to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let content = (self.handler)(request)?;
        let mut response = LlmResponse::content_only(content);
        response.usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        };
        response.metadata.model = request.model.clone();
        response.metadata.provider = "scripted".to_string();
        Ok(response)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
