//! Mock backend for testing
//!
//! Replays a script of assistant replies and records every request it
//! receives. Clones share the same script and log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::types::{ChatMessage, ChatRequest, ToolCall};
use super::ChatBackend;
use crate::error::{Error, Result};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockTurn {
    Reply(ChatMessage),
    Fail(String),
}

#[derive(Default)]
struct MockState {
    script: VecDeque<MockTurn>,
    /// Served whenever the script runs dry
    fallback: Option<MockTurn>,
    requests: Vec<ChatRequest>,
}

/// Scripted chat backend
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an assistant reply with plain content
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.push(MockTurn::Reply(ChatMessage::assistant(content)))
    }

    /// Queue an assistant reply that requests tool calls
    pub fn tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.push(MockTurn::Reply(ChatMessage::assistant_tool_calls(None, calls)))
    }

    /// Queue a failed call
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(MockTurn::Fail(message.into()))
    }

    /// Reply with `turn` forever once the script is exhausted
    pub fn otherwise(self, turn: MockTurn) -> Self {
        self.lock().fallback = Some(turn);
        self
    }

    fn push(self, turn: MockTurn) -> Self {
        self.lock().script.push_back(turn);
        self
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage> {
        let mut state = self.lock();
        state.requests.push(request);
        let turn = match state.script.pop_front() {
            Some(turn) => turn,
            None => state
                .fallback
                .clone()
                .ok_or_else(|| Error::Llm("Mock backend script exhausted".into()))?,
        };
        match turn {
            MockTurn::Reply(message) => Ok(message),
            MockTurn::Fail(message) => Err(Error::Llm(message)),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://"
    }
}
