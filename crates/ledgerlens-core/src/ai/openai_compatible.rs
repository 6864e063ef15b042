//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API
//! with tool calling: OpenAI itself, Azure OpenAI behind a compatible
//! gateway, vLLM, LocalAI, llama-server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ChatMessage, ChatRequest, ResponseFormat, ToolDefinition};
use super::ChatBackend;
use crate::error::{Error, Result};

/// OpenAI-compatible backend
///
/// The request timeout is enforced by the HTTP client; a timed-out call
/// surfaces as an ordinary `Error::Http`.
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAICompatibleBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage> {
        let has_tools = !request.tools.is_empty();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            tool_choice: has_tools.then_some("auto"),
            tools: has_tools.then_some(&request.tools),
            response_format: request.response_format.as_ref(),
            temperature: request.temperature,
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            structured = request.response_format.is_some(),
            "Sending chat completion request"
        );

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Chat completion error {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::Llm("No choices in chat completion response".into()))?;

        debug!(
            tool_calls = message.requested_tool_calls().len(),
            has_content = message.text().is_some(),
            "Received chat completion"
        );

        Ok(message)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a ResponseFormat>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
