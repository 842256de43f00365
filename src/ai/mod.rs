//! Text-Generation Integration Layer
//!
//! Backend client, call policy, prompt construction, structured-output
//! extraction and usage accounting shared by every pipeline role.

pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use metrics::{RoleUsage, SharedLedger, UsageLedger, UsageSummary};
pub use prompt::{PromptBuilder, PromptSection};
pub use provider::{
    ChatMessage, ErrorCategory, ErrorClassifier, GenerationRequest, LlmError, LlmProvider,
    LlmResponse, OpenRouterProvider, ResponseMetadata, ResponseTiming, SharedProvider,
    ThrottledProvider, TokenUsage, create_provider,
};
pub use timeout::with_timeout;
pub use validation::{extract_structured, strip_fences};
