//! Bounded tool-calling loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Agent Loop                              │
//! │                                                                 │
//! │   1. Send full history + tool schemas (tool_choice = auto)      │
//! │   2. If the reply requests tools:                               │
//! │      a. Execute each one, in the order received                 │
//! │      b. Append every result (success or {error}) to history     │
//! │      c. Repeat until a tool-free reply or max_iterations        │
//! │   3. Caller may then request one schema-constrained synthesis   │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Model-call failures propagate to the caller; nothing is retried here.
//! Tool failures never do: they are data the model sees and reacts to.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::parsing::{extract_json, parse_arguments};
use super::types::{ChatMessage, ChatRequest, ResponseFormat, ToolDefinition};
use super::ChatBackend;
use crate::error::Result;
use crate::tools::ToolOutput;

/// Executes tool calls on behalf of the loop
pub trait ToolDispatcher: Send + Sync {
    /// Run one tool. Every failure, including an unknown name, is a
    /// `ToolOutput::Failure`.
    fn dispatch(&self, name: &str, arguments: Map<String, Value>) -> ToolOutput;
}

/// Record of a tool call made during the loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name (e.g., "get_cashflow_summary")
    pub name: String,
    /// Arguments as the model sent them
    pub input: Value,
    pub success: bool,
    /// Serialized result or error payload
    pub output: String,
}

/// History and bookkeeping accumulated by one loop run
#[derive(Debug, Clone)]
pub struct LoopTranscript {
    pub messages: Vec<ChatMessage>,
    /// Tool names in invocation order, repeats included
    pub tools_used: Vec<String>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations: usize,
}

/// How the iteration phase ended
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The model replied without requesting tools
    Completed {
        transcript: LoopTranscript,
        final_message: ChatMessage,
    },
    /// `max_iterations` passed with tool requests on every turn
    Exhausted(LoopTranscript),
}

impl LoopOutcome {
    pub fn transcript(&self) -> &LoopTranscript {
        match self {
            LoopOutcome::Completed { transcript, .. } => transcript,
            LoopOutcome::Exhausted(transcript) => transcript,
        }
    }
}

/// Tool-calling loop against one backend and a fixed tool surface
pub struct AgentLoop<'a> {
    backend: &'a dyn ChatBackend,
    tools: Vec<ToolDefinition>,
    max_iterations: usize,
    temperature: f32,
}

impl<'a> AgentLoop<'a> {
    pub fn new(backend: &'a dyn ChatBackend, tools: Vec<ToolDefinition>) -> Self {
        Self {
            backend,
            tools,
            max_iterations: 6,
            temperature: 0.2,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Iterate until the model stops requesting tools or the budget runs out
    pub async fn run(
        &self,
        mut messages: Vec<ChatMessage>,
        dispatcher: &dyn ToolDispatcher,
    ) -> Result<LoopOutcome> {
        let mut tools_used: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();

        info!(
            model = %self.backend.model(),
            tools = self.tools.len(),
            max_iterations = self.max_iterations,
            "Starting agent loop"
        );

        for iteration in 0..self.max_iterations {
            debug!(iteration, history = messages.len(), "Agent iteration");

            let request =
                ChatRequest::with_tools(messages.clone(), self.tools.clone(), self.temperature);
            let response = self.backend.chat(request).await?;
            let calls = response.requested_tool_calls().to_vec();
            messages.push(response.clone());

            if calls.is_empty() {
                info!(
                    iteration,
                    tools_used = tools_used.len(),
                    "Agent loop complete (no tool calls)"
                );
                return Ok(LoopOutcome::Completed {
                    transcript: LoopTranscript {
                        messages,
                        tools_used,
                        tool_calls,
                        iterations: iteration + 1,
                    },
                    final_message: response,
                });
            }

            debug!(iteration, tool_count = calls.len(), "Executing tool calls");

            // Strictly sequential: later calls may rely on snapshots cached by earlier ones
            for call in calls {
                let name = call.function.name.clone();
                let arguments = parse_arguments(&call.function.arguments);
                debug!(
                    iteration,
                    tool = %name,
                    args = %redact_user(&arguments),
                    "Executing tool"
                );

                let output = self.dispatch_one(dispatcher, &name, arguments.clone());
                let content = output.to_json_string();

                tool_calls.push(ToolCallRecord {
                    name: name.clone(),
                    input: Value::Object(arguments),
                    success: output.is_success(),
                    output: content.clone(),
                });
                messages.push(ChatMessage::tool_result(call.id, name.clone(), content));
                tools_used.push(name);
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            tools_used = tools_used.len(),
            "Agent reached maximum iterations without final response"
        );
        Ok(LoopOutcome::Exhausted(LoopTranscript {
            messages,
            tools_used,
            tool_calls,
            iterations: self.max_iterations,
        }))
    }

    fn dispatch_one(
        &self,
        dispatcher: &dyn ToolDispatcher,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ToolOutput {
        let output = dispatcher.dispatch(name, arguments);
        match &output {
            ToolOutput::Success(_) => debug!(tool = name, "Tool succeeded"),
            ToolOutput::Failure(error) => warn!(tool = name, error = %error, "Tool returned error"),
        }
        output
    }

    /// Ask for one schema-constrained document after the loop completes
    ///
    /// A reply that does not parse as `T` yields `Ok(None)`. Call failures
    /// propagate.
    pub async fn synthesize<T: DeserializeOwned>(
        &self,
        messages: &[ChatMessage],
        instruction: &str,
        format: ResponseFormat,
    ) -> Result<Option<T>> {
        let mut request_messages = messages.to_vec();
        request_messages.push(ChatMessage::user(instruction));

        let schema = format.json_schema.name.clone();
        let response = self
            .backend
            .chat(ChatRequest::structured(request_messages, format, self.temperature))
            .await?;

        let Some(content) = response.text() else {
            warn!(schema = %schema, "Structured synthesis returned no content");
            return Ok(None);
        };

        match extract_json::<T>(content) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(schema = %schema, error = %e, "Failed to parse structured response");
                Ok(None)
            }
        }
    }
}

/// Arguments for logging, with the user id masked
fn redact_user(arguments: &Map<String, Value>) -> Value {
    let mut redacted = arguments.clone();
    for key in ["user_id", "user", "userId"] {
        if redacted.contains_key(key) {
            redacted.insert(key.to_string(), Value::String("***".into()));
        }
    }
    Value::Object(redacted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockTurn, ToolCall};
    use crate::error::Error;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records dispatch order; `fail_*` tools return errors
    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl ToolDispatcher for RecordingDispatcher {
        fn dispatch(&self, name: &str, arguments: Map<String, Value>) -> ToolOutput {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments.clone()));
            if name.starts_with("fail_") {
                ToolOutput::Failure(format!("Unknown tool: {}", name))
            } else {
                ToolOutput::Success(json!({ "tool": name, "args": arguments }))
            }
        }
    }

    fn tools() -> Vec<ToolDefinition> {
        vec![ToolDefinition::new("alpha", "A", json!({"type": "object"}))]
    }

    #[derive(Debug, Deserialize)]
    struct Summary {
        headline: String,
    }

    #[tokio::test]
    async fn test_tool_calls_run_in_received_order() {
        let mock = MockBackend::new()
            .tool_calls(vec![
                ToolCall::new("c1", "alpha", r#"{"n": 1}"#),
                ToolCall::new("c2", "beta", "not json"),
                ToolCall::new("c3", "fail_gamma", "{}"),
            ])
            .reply("all done");
        let dispatcher = RecordingDispatcher::default();

        let outcome = AgentLoop::new(&mock, tools())
            .run(vec![ChatMessage::user("go")], &dispatcher)
            .await
            .unwrap();

        let LoopOutcome::Completed {
            transcript,
            final_message,
        } = outcome
        else {
            panic!("expected completion");
        };
        assert_eq!(final_message.text(), Some("all done"));
        assert_eq!(transcript.iterations, 2);
        assert_eq!(transcript.tools_used, vec!["alpha", "beta", "fail_gamma"]);

        let calls = dispatcher.calls.lock().unwrap();
        assert_eq!(calls[0].1["n"], 1);
        // Unparseable arguments become an empty object
        assert!(calls[1].1.is_empty());

        // user, assistant(tool_calls), 3 tool results, final assistant
        assert_eq!(transcript.messages.len(), 6);
        let results: Vec<&ChatMessage> = transcript
            .messages
            .iter()
            .filter(|m| m.role == "tool")
            .collect();
        assert_eq!(results[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(results[2].tool_call_id.as_deref(), Some("c3"));
        assert_eq!(
            results[2].content.as_deref(),
            Some(r#"{"error":"Unknown tool: fail_gamma"}"#)
        );
        assert!(!transcript.tool_calls[2].success);

        // Second request carried the full history
        let requests = mock.requests();
        assert_eq!(requests[1].messages.len(), 5);
        assert_eq!(requests[1].tools.len(), 1);
        assert!(requests[1].response_format.is_none());
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let mock = MockBackend::new().otherwise(MockTurn::Reply(ChatMessage::assistant_tool_calls(
            None,
            vec![ToolCall::new("c", "alpha", "{}")],
        )));
        let dispatcher = RecordingDispatcher::default();

        let outcome = AgentLoop::new(&mock, tools())
            .with_max_iterations(3)
            .run(vec![ChatMessage::user("go")], &dispatcher)
            .await
            .unwrap();

        assert!(matches!(outcome, LoopOutcome::Exhausted(_)));
        assert_eq!(outcome.transcript().tools_used.len(), 3);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let mock = MockBackend::new().fail("connection refused");
        let result = AgentLoop::new(&mock, tools())
            .run(vec![ChatMessage::user("go")], &RecordingDispatcher::default())
            .await;
        assert!(matches!(result, Err(Error::Llm(_))));
    }

    #[tokio::test]
    async fn test_synthesize_parses_or_yields_none() {
        let mock = MockBackend::new()
            .reply(r#"{"headline": "Solid month"}"#)
            .reply("I cannot produce JSON today");
        let agent = AgentLoop::new(&mock, tools()).with_temperature(0.3);
        let format = ResponseFormat::json_schema("demo", json!({"type": "object"}));

        let parsed: Option<Summary> = agent
            .synthesize(&[ChatMessage::user("hi")], "Summarize.", format.clone())
            .await
            .unwrap();
        assert_eq!(parsed.unwrap().headline, "Solid month");

        let failed: Option<Summary> = agent
            .synthesize(&[ChatMessage::user("hi")], "Summarize.", format)
            .await
            .unwrap();
        assert!(failed.is_none());

        let request = &mock.requests()[0];
        assert!(request.tools.is_empty());
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.messages.last().unwrap().content.as_deref(), Some("Summarize."));
    }

    #[test]
    fn test_redact_user() {
        let mut args = Map::new();
        args.insert("user_id".into(), json!("u-123"));
        args.insert("period_days".into(), json!(30));
        let redacted = redact_user(&args);
        assert_eq!(redacted["user_id"], "***");
        assert_eq!(redacted["period_days"], 30);
    }
}
