//! Conversational financial advisor
//!
//! Answers one question at a time with the advisor tool set. The user id is
//! forced onto every tool call, whatever the model sent. Unlike report
//! generation, nothing is persisted and model failures propagate: a caller
//! should tell the user the service is unavailable rather than show a
//! best-effort partial answer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::ai::{AgentLoop, ChatClient, ChatMessage, LoopOutcome, ResponseFormat};
use crate::config::AdvisorConfig;
use crate::error::Result;
use crate::prompts::{PromptId, PromptLibrary};
use crate::repository::Repository;
use crate::snapshot::{SnapshotBuilder, SnapshotCache};
use crate::tools::{ToolExecutor, ToolSession, ToolSet, UserIdPolicy};

pub const ANSWER_SCHEMA_NAME: &str = "chatbot_response";

const NO_TOOLS_DEFAULT: &str = "I'm here to help with your financial questions!";
const PARSE_FAILED_DEFAULT: &str = "Analysis complete";
const MAX_DEPTH_MESSAGE: &str = "I've reached the maximum analysis depth. Please try rephrasing your question or breaking it into smaller parts.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetric {
    pub metric: String,
    pub value: String,
    pub assessment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerAnalysis {
    #[serde(default)]
    pub key_metrics: Vec<AnswerMetric>,
    #[serde(default)]
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecommendation {
    pub action: String,
    pub priority: Priority,
    pub expected_impact: String,
}

/// Schema-constrained advisor answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub summary: String,
    #[serde(default)]
    pub analysis: AnswerAnalysis,
    #[serde(default)]
    pub recommendations: Vec<AnswerRecommendation>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub iterations: usize,
}

impl StructuredAnswer {
    fn unavailable() -> Self {
        Self {
            summary: "AI service unavailable".to_string(),
            analysis: AnswerAnalysis {
                key_metrics: Vec::new(),
                insights: vec!["AI service is not configured".to_string()],
            },
            recommendations: Vec::new(),
            tools_used: Vec::new(),
            iterations: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum AdvisorAnswer {
    /// Tools were used and the synthesis parsed
    Structured(StructuredAnswer),
    /// Free text from the model, or a fixed message
    Plain { answer: String, tools_used: Vec<String> },
    /// No model configured
    Unavailable(StructuredAnswer),
}

impl AdvisorAnswer {
    fn plain(answer: impl Into<String>, tools_used: Vec<String>) -> Self {
        AdvisorAnswer::Plain {
            answer: answer.into(),
            tools_used,
        }
    }

    /// Headline text for display
    pub fn summary(&self) -> &str {
        match self {
            AdvisorAnswer::Structured(a) | AdvisorAnswer::Unavailable(a) => &a.summary,
            AdvisorAnswer::Plain { answer, .. } => answer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvisorResponse {
    pub query: String,
    #[serde(flatten)]
    pub answer: AdvisorAnswer,
}

/// JSON schema for the structured answer
pub fn answer_response_format() -> ResponseFormat {
    ResponseFormat::json_schema(
        ANSWER_SCHEMA_NAME,
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string", "description": "Brief 1-2 sentence answer"},
                "analysis": {
                    "type": "object",
                    "properties": {
                        "key_metrics": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "metric": {"type": "string"},
                                    "value": {"type": "string"},
                                    "assessment": {"type": "string"}
                                },
                                "required": ["metric", "value", "assessment"],
                                "additionalProperties": false
                            }
                        },
                        "insights": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["key_metrics", "insights"],
                    "additionalProperties": false
                },
                "recommendations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "action": {"type": "string"},
                            "priority": {"type": "string", "enum": ["high", "medium", "low"]},
                            "expected_impact": {"type": "string"}
                        },
                        "required": ["action", "priority", "expected_impact"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["summary", "analysis", "recommendations"],
            "additionalProperties": false
        }),
    )
}

pub struct FinancialAdvisor {
    repo: Arc<dyn Repository>,
    client: Option<ChatClient>,
    prompts: PromptLibrary,
    config: AdvisorConfig,
    today: Option<NaiveDate>,
}

impl FinancialAdvisor {
    pub fn new(
        repo: Arc<dyn Repository>,
        client: Option<ChatClient>,
        prompts: PromptLibrary,
        config: AdvisorConfig,
    ) -> Self {
        Self {
            repo,
            client,
            prompts,
            config,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// System prompt, the tail of `history`, then the question
    fn initial_messages(&self, question: &str, history: &[ChatMessage]) -> Result<Vec<ChatMessage>> {
        let window = history.len().saturating_sub(self.config.history_window);
        let mut messages = Vec::with_capacity(history.len() - window + 2);
        messages.push(ChatMessage::system(self.prompts.system(PromptId::AdvisorAgent)?));
        messages.extend_from_slice(&history[window..]);
        messages.push(ChatMessage::user(question));
        Ok(messages)
    }

    /// Answer one question about `user_id`'s finances
    pub async fn answer_question(
        &self,
        user_id: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<AdvisorResponse> {
        let respond = |answer| AdvisorResponse {
            query: question.to_string(),
            answer,
        };

        let Some(client) = &self.client else {
            warn!(user_id, "No model configured; advisor unavailable");
            return Ok(respond(AdvisorAnswer::Unavailable(StructuredAnswer::unavailable())));
        };

        let cache = SnapshotCache::new(SnapshotBuilder::new(self.repo.as_ref(), self.today()));
        let executor = ToolExecutor::new(&cache, ToolSet::Advisor);
        let session = ToolSession::new(&executor, user_id, UserIdPolicy::Override);
        let agent = AgentLoop::new(client, ToolSet::Advisor.definitions())
            .with_max_iterations(self.config.max_iterations)
            .with_temperature(self.config.temperature);

        info!(user_id, "Advisor answering question");
        let outcome = agent
            .run(self.initial_messages(question, history)?, &session)
            .await?;

        let (transcript, final_message) = match outcome {
            LoopOutcome::Completed {
                transcript,
                final_message,
            } => (transcript, final_message),
            LoopOutcome::Exhausted(transcript) => {
                warn!(user_id, tools_used = transcript.tools_used.len(), "Advisor reached maximum depth");
                return Ok(respond(AdvisorAnswer::plain(MAX_DEPTH_MESSAGE, transcript.tools_used)));
            }
        };

        if transcript.tools_used.is_empty() {
            let text = final_message.text().unwrap_or(NO_TOOLS_DEFAULT);
            return Ok(respond(AdvisorAnswer::plain(text, Vec::new())));
        }

        let instruction = self
            .prompts
            .user(PromptId::AdvisorSynthesis, &HashMap::new())?;
        let parsed: Option<StructuredAnswer> = agent
            .synthesize(&transcript.messages, &instruction, answer_response_format())
            .await?;

        let answer = match parsed {
            Some(mut answer) => {
                answer.tools_used = transcript.tools_used;
                answer.iterations = transcript.iterations;
                AdvisorAnswer::Structured(answer)
            }
            None => {
                let text = final_message.text().unwrap_or(PARSE_FAILED_DEFAULT);
                AdvisorAnswer::plain(text, transcript.tools_used)
            }
        };
        Ok(respond(answer))
    }
}
