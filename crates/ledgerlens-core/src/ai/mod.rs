//! Language-model backend abstraction
//!
//! # Architecture
//!
//! - `ChatBackend` trait: one chat-completion round trip
//! - `ChatClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `OpenAICompatibleBackend` (any `/v1/chat/completions` server),
//!   `MockBackend` (scripted replies for tests)
//! - `orchestrator`: the bounded tool-calling loop built on top
//!
//! # Configuration
//!
//! Backends are built from the `[llm]` config table (see [`crate::config`]).
//! A missing `base_url` or `model` means no model is configured, which callers
//! treat as "use the heuristic path", not as an error.

mod mock;
mod openai_compatible;
pub mod orchestrator;
pub mod parsing;
pub mod types;

pub use mock::{MockBackend, MockTurn};
pub use openai_compatible::OpenAICompatibleBackend;
pub use orchestrator::{AgentLoop, LoopOutcome, LoopTranscript, ToolCallRecord, ToolDispatcher};
pub use types::*;

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::error::Result;

/// A chat-completion service
///
/// Backends must be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one completion request and return the assistant message
    ///
    /// Transport failures, timeouts, and non-success statuses are errors.
    /// No retries happen here.
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage>;

    /// Model name (for logging)
    fn model(&self) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete chat client enum
#[derive(Clone)]
pub enum ChatClient {
    /// OpenAI-compatible HTTP backend (OpenAI, Azure OpenAI, vLLM, LocalAI, llama-server, ...)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Scripted backend for testing
    Mock(MockBackend),
}

impl ChatClient {
    /// Build a client from the `[llm]` config table
    ///
    /// Returns `Ok(None)` when no endpoint or model is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let (Some(base_url), Some(model)) = (config.base_url(), config.model()) else {
            return Ok(None);
        };
        let backend = OpenAICompatibleBackend::new(
            base_url,
            model,
            config.api_key.as_deref(),
            config.timeout(),
        )?;
        Ok(Some(ChatClient::OpenAICompatible(backend)))
    }

    pub fn mock(backend: MockBackend) -> Self {
        ChatClient::Mock(backend)
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage> {
        match self {
            ChatClient::OpenAICompatible(b) => b.chat(request).await,
            ChatClient::Mock(b) => b.chat(request).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ChatClient::OpenAICompatible(b) => b.model(),
            ChatClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ChatClient::OpenAICompatible(b) => b.host(),
            ChatClient::Mock(b) => b.host(),
        }
    }
}
