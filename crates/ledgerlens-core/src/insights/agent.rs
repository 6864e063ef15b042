//! Autonomous report agent
//!
//! Hands the model a compact view of the snapshot, lets it pull more detail
//! through the report tool set, then asks for one schema-constrained report.
//! Returns `Ok(None)` whenever no usable structured report came back
//! (iteration budget exhausted, unparseable synthesis) so the caller can
//! fall back to the heuristic document.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::types::StructuredInsight;
use crate::ai::{AgentLoop, ChatBackend, ChatMessage, LoopOutcome, ResponseFormat};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::models::DateRange;
use crate::prompts::{PromptId, PromptLibrary};
use crate::snapshot::{AccountSummary, CashflowComparison, CategoryBreakdown, Snapshot, SnapshotCache};
use crate::tools::{ToolExecutor, ToolSession, ToolSet, UserIdPolicy};

/// Name of the report response schema
pub const REPORT_SCHEMA_NAME: &str = "ledgerlens_insight_response";

/// Categories included in the opening context
const CONTEXT_CATEGORIES: usize = 5;

/// Opening context handed to the model
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContext<'s> {
    pub period_days: u32,
    pub date_range: DateRange,
    pub account_summary: &'s AccountSummary,
    pub cashflow: &'s CashflowComparison,
    pub category_highlights: &'s [CategoryBreakdown],
    pub opportunity_signals: &'s [String],
    pub net_cashflow: f64,
    pub transaction_count: usize,
}

impl<'s> ReportContext<'s> {
    pub fn from_snapshot(snapshot: &'s Snapshot) -> Self {
        let categories = &snapshot.category_breakdown;
        Self {
            period_days: snapshot.period_days,
            date_range: snapshot.date_range,
            account_summary: &snapshot.account_summary,
            cashflow: &snapshot.cashflow,
            category_highlights: &categories[..categories.len().min(CONTEXT_CATEGORIES)],
            opportunity_signals: &snapshot.opportunity_signals,
            net_cashflow: snapshot.net_cashflow(),
            transaction_count: snapshot.transaction_count(),
        }
    }
}

/// JSON schema for the structured report
pub fn report_response_format() -> ResponseFormat {
    let nullable_string = json!({"type": ["string", "null"]});
    ResponseFormat::json_schema(
        REPORT_SCHEMA_NAME,
        json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "object",
                    "properties": {
                        "headline": {"type": "string"},
                        "narrative": {"type": "string"}
                    },
                    "required": ["headline", "narrative"],
                    "additionalProperties": false
                },
                "key_metrics": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "label": {"type": "string"},
                            "value": {"type": ["number", "null"]},
                            "displayValue": nullable_string
                        },
                        "required": ["label", "value", "displayValue"],
                        "additionalProperties": false
                    }
                },
                "highlights": {"type": "array", "items": {"type": "string"}},
                "recommendations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string"},
                            "detail": {"type": "string"},
                            "impact": {"type": "string"},
                            "action": {"type": "string"},
                            "category": nullable_string
                        },
                        "required": ["title", "detail", "impact", "action", "category"],
                        "additionalProperties": false
                    }
                },
                "alerts": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["summary", "key_metrics", "recommendations", "highlights", "alerts"],
            "additionalProperties": false
        }),
    )
}

/// Tool-calling report generator for one snapshot
pub struct ReportAgent<'a> {
    backend: &'a dyn ChatBackend,
    prompts: &'a PromptLibrary,
    config: &'a ReportConfig,
}

impl<'a> ReportAgent<'a> {
    pub fn new(
        backend: &'a dyn ChatBackend,
        prompts: &'a PromptLibrary,
        config: &'a ReportConfig,
    ) -> Self {
        Self {
            backend,
            prompts,
            config,
        }
    }

    /// Opening system and user messages
    pub fn initial_messages(&self, snapshot: &Snapshot) -> Result<Vec<ChatMessage>> {
        let context = serde_json::to_string_pretty(&ReportContext::from_snapshot(snapshot))?;
        let vars = HashMap::from([("context", context.as_str())]);
        Ok(vec![
            ChatMessage::system(self.prompts.system(PromptId::ReportAgent)?),
            ChatMessage::user(self.prompts.user(PromptId::ReportAgent, &vars)?),
        ])
    }

    /// Run the loop and request the structured report
    ///
    /// Tool calls read through `cache`, so snapshots built for one call are
    /// reused by later calls in the same pass. Model-call failures propagate.
    pub async fn run(
        &self,
        snapshot: &Snapshot,
        cache: &SnapshotCache<'_>,
    ) -> Result<Option<StructuredInsight>> {
        let executor = ToolExecutor::new(cache, ToolSet::Report);
        let session = ToolSession::new(&executor, &snapshot.user_id, UserIdPolicy::FillMissing)
            .with_period_days(snapshot.period_days);
        let agent = AgentLoop::new(self.backend, ToolSet::Report.definitions())
            .with_max_iterations(self.config.max_iterations)
            .with_temperature(self.config.temperature);

        let outcome = agent.run(self.initial_messages(snapshot)?, &session).await?;

        let transcript = match outcome {
            LoopOutcome::Completed { transcript, .. } => transcript,
            LoopOutcome::Exhausted(transcript) => {
                warn!(
                    user_id = %snapshot.user_id,
                    iterations = transcript.iterations,
                    "Report agent exhausted its iteration budget"
                );
                return Ok(None);
            }
        };

        let instruction = self
            .prompts
            .user(PromptId::ReportSynthesis, &HashMap::new())?;
        let parsed: Option<StructuredInsight> = agent
            .synthesize(&transcript.messages, &instruction, report_response_format())
            .await?;

        Ok(parsed.map(|mut insight| {
            insight.tools_used = transcript.tools_used.clone();
            insight.iterations = transcript.iterations;
            info!(
                user_id = %snapshot.user_id,
                tools_used = insight.tools_used.len(),
                iterations = insight.iterations,
                "Report agent produced structured insight"
            );
            insight
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockTurn, ToolCall};
    use crate::error::Error;
    use crate::snapshot::SnapshotBuilder;
    use crate::test_utils::{spend, InMemoryRepository};
    use chrono::{Duration, NaiveDate};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn repo() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.add_transaction("u1", spend("rent", 1200.0, today() - Duration::days(5), &["Rent"]));
        repo.add_transaction("u1", spend("pay", -3000.0, today() - Duration::days(3), &[]));
        repo
    }

    const REPORT_JSON: &str = r#"{
        "summary": {"headline": "Rent is most of your spend", "narrative": "..."},
        "key_metrics": [{"label": "Rent share", "value": 100, "displayValue": "100%"}],
        "highlights": ["Saved 60% of income"],
        "recommendations": [],
        "alerts": []
    }"#;

    #[test]
    fn test_initial_messages_embed_context() {
        let repo = repo();
        let snapshot = SnapshotBuilder::new(&repo, today()).build("u1", 30).unwrap();
        let prompts = PromptLibrary::embedded_only().unwrap();
        let config = ReportConfig::default();
        let mock = MockBackend::new();
        let agent = ReportAgent::new(&mock, &prompts, &config);

        let messages = agent.initial_messages(&snapshot).unwrap();
        assert_eq!(messages[0].role, "system");
        let user = messages[1].content.as_deref().unwrap();
        let (_, context) = user.split_once("Context:\n").unwrap();
        let context: serde_json::Value = serde_json::from_str(context).unwrap();
        assert_eq!(context["periodDays"], 30);
        assert_eq!(context["netCashflow"], 1800.0);
        assert_eq!(context["transactionCount"], 2);
        assert_eq!(context["categoryHighlights"][0]["category"], "Rent");
        assert!(context["cashflow"]["baseline"].is_object());
    }

    #[tokio::test]
    async fn test_run_fills_user_and_period_and_annotates() {
        let repo = repo();
        let builder = SnapshotBuilder::new(&repo, today());
        let snapshot = builder.build("u1", 30).unwrap();
        let cache = SnapshotCache::new(builder);
        let prompts = PromptLibrary::embedded_only().unwrap();
        let config = ReportConfig::default();
        let mock = MockBackend::new()
            .tool_calls(vec![
                ToolCall::new("c1", "get_cashflow_summary", "{}"),
                ToolCall::new("c2", "get_spending_trends", r#"{"top": 3}"#),
            ])
            .reply("Analysis done.")
            .reply(REPORT_JSON);

        let insight = ReportAgent::new(&mock, &prompts, &config)
            .run(&snapshot, &cache)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(insight.tools_used, vec!["get_cashflow_summary", "get_spending_trends"]);
        assert_eq!(insight.iterations, 2);
        // Both calls resolved to the run's (user, period) snapshot
        assert_eq!(cache.len(), 1);

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].tools.len(), 6);
        assert_eq!(requests[0].temperature, 0.2);
        let tool_result = requests[1].messages[3].content.as_deref().unwrap();
        assert!(tool_result.contains("\"netCashflow\":1800"));

        let synthesis = &requests[2];
        assert!(synthesis.tools.is_empty());
        assert_eq!(
            synthesis.response_format.as_ref().unwrap().json_schema.name,
            REPORT_SCHEMA_NAME
        );
        assert!(synthesis
            .messages
            .last()
            .unwrap()
            .content
            .as_deref()
            .unwrap()
            .starts_with("Synthesize a structured insight report"));
    }

    #[tokio::test]
    async fn test_exhaustion_and_bad_synthesis_yield_none() {
        let repo = repo();
        let builder = SnapshotBuilder::new(&repo, today());
        let snapshot = builder.build("u1", 30).unwrap();
        let prompts = PromptLibrary::embedded_only().unwrap();
        let config = ReportConfig::default();

        let looping = MockBackend::new().otherwise(MockTurn::Reply(
            ChatMessage::assistant_tool_calls(
                None,
                vec![ToolCall::new("c", "get_opportunity_signals", "{}")],
            ),
        ));
        let cache = SnapshotCache::new(SnapshotBuilder::new(&repo, today()));
        let result = ReportAgent::new(&looping, &prompts, &config)
            .run(&snapshot, &cache)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(looping.call_count(), config.max_iterations);

        let garbled = MockBackend::new().reply("done").reply("not json at all");
        let cache = SnapshotCache::new(SnapshotBuilder::new(&repo, today()));
        let result = ReportAgent::new(&garbled, &prompts, &config)
            .run(&snapshot, &cache)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let repo = repo();
        let builder = SnapshotBuilder::new(&repo, today());
        let snapshot = builder.build("u1", 30).unwrap();
        let cache = SnapshotCache::new(builder);
        let prompts = PromptLibrary::embedded_only().unwrap();
        let config = ReportConfig::default();
        let mock = MockBackend::new().fail("503 from upstream");

        let result = ReportAgent::new(&mock, &prompts, &config)
            .run(&snapshot, &cache)
            .await;
        assert!(matches!(result, Err(Error::Llm(_))));
    }
}
