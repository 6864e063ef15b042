//! Insight generation with graceful degradation
//!
//! Each run picks exactly one rung of the ladder:
//!
//! 1. **Placeholder** - no transactions in the period
//! 2. **Heuristic** - no model configured, no structured result, or the
//!    model call failed
//! 3. **Structured** - the report agent succeeded
//!
//! Whatever the rung, the resulting document overwrites the user's stored
//! document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tracing::{error, info, warn};

use super::agent::ReportAgent;
use super::synthesizer::{heuristic_document, placeholder_document, structured_document};
use super::types::{
    BatchFailure, BatchOutcome, BatchSummary, FallbackReason, GenerationOutcome, GenerationStatus,
    InsightDocument,
};
use crate::ai::ChatClient;
use crate::config::ReportConfig;
use crate::error::Result;
use crate::prompts::PromptLibrary;
use crate::repository::Repository;
use crate::snapshot::{Snapshot, SnapshotBuilder, SnapshotCache};

/// Resets the batch flag when a batch ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct InsightGenerator {
    repo: Arc<dyn Repository>,
    client: Option<ChatClient>,
    prompts: PromptLibrary,
    config: ReportConfig,
    /// Fixed anchor date; local today when unset
    today: Option<NaiveDate>,
    batch_running: AtomicBool,
}

impl InsightGenerator {
    /// `client` is `None` when no model is configured
    pub fn new(
        repo: Arc<dyn Repository>,
        client: Option<ChatClient>,
        prompts: PromptLibrary,
        config: ReportConfig,
    ) -> Self {
        Self {
            repo,
            client,
            prompts,
            config,
            today: None,
            batch_running: AtomicBool::new(false),
        }
    }

    /// Anchor every period on `today` instead of the local date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn has_model(&self) -> bool {
        self.client.is_some()
    }

    pub fn default_period_days(&self) -> u32 {
        self.config.default_period_days
    }

    /// Generate and store one user's insight document
    ///
    /// Repository failures propagate. Model failures do not: they downgrade
    /// the run to a heuristic document.
    pub async fn generate_for_user(&self, user_id: &str, period_days: u32) -> Result<GenerationOutcome> {
        let period_days = period_days.max(1);
        let cache = SnapshotCache::new(SnapshotBuilder::new(self.repo.as_ref(), self.today()));
        let snapshot = cache.get(user_id, period_days)?;
        let tag = self.config.generated_from.as_str();

        if snapshot.transaction_count() == 0 {
            let document = placeholder_document(&snapshot, tag, Utc::now());
            self.repo.upsert_insight_document(user_id, &document)?;
            info!(user_id, period_days, "No transactions; stored placeholder insight");
            return Ok(outcome(user_id, GenerationStatus::Placeholder, document, None));
        }

        let Some(client) = &self.client else {
            warn!(user_id, "No model configured; storing heuristic insight");
            return self.store_heuristic(user_id, &snapshot, FallbackReason::ModelUnavailable);
        };

        let agent = ReportAgent::new(client, &self.prompts, &self.config);
        match agent.run(&snapshot, &cache).await {
            Ok(Some(insight)) => {
                let document = structured_document(&snapshot, &insight, tag, Utc::now());
                self.repo.upsert_insight_document(user_id, &document)?;
                info!(
                    user_id,
                    metrics = document.key_metrics.len(),
                    tools_used = insight.tools_used.len(),
                    "Stored structured insight"
                );
                let mut result = outcome(user_id, GenerationStatus::Success, document, None);
                result.tools_used = insight.tools_used;
                Ok(result)
            }
            Ok(None) => {
                warn!(user_id, "Agent returned no structured result; storing heuristic insight");
                self.store_heuristic(user_id, &snapshot, FallbackReason::NoStructuredResult)
            }
            Err(e) => {
                warn!(user_id, error = %e, "Model call failed; storing heuristic insight");
                self.store_heuristic(user_id, &snapshot, FallbackReason::ModelError(e.to_string()))
            }
        }
    }

    fn store_heuristic(
        &self,
        user_id: &str,
        snapshot: &Snapshot,
        reason: FallbackReason,
    ) -> Result<GenerationOutcome> {
        let document = heuristic_document(snapshot, &self.config.generated_from, Utc::now());
        self.repo.upsert_insight_document(user_id, &document)?;
        Ok(outcome(user_id, GenerationStatus::Heuristic, document, Some(reason)))
    }

    /// Generate for every user with connected accounts, one at a time
    ///
    /// A failure for one user is logged and counted; it never stops the
    /// batch. Returns `AlreadyRunning` if another batch is in progress.
    pub async fn generate_for_all_users(&self, period_days: u32) -> Result<BatchOutcome> {
        if self
            .batch_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Insight batch already running; skipping");
            return Ok(BatchOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.batch_running);

        let user_ids = self.repo.list_user_ids()?;
        info!(users = user_ids.len(), period_days, "Generating insights for all users");

        let mut summary = BatchSummary {
            users: user_ids.len(),
            ..Default::default()
        };
        for user_id in user_ids {
            match self.generate_for_user(&user_id, period_days).await {
                Ok(result) => summary.record(result.status),
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "Insight generation failed");
                    summary.failures.push(BatchFailure {
                        user_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            success = summary.success,
            heuristic = summary.heuristic,
            placeholder = summary.placeholder,
            failed = summary.failures.len(),
            "Insight batch complete"
        );
        Ok(BatchOutcome::Completed(summary))
    }
}

fn outcome(
    user_id: &str,
    status: GenerationStatus,
    insight: InsightDocument,
    fallback: Option<FallbackReason>,
) -> GenerationOutcome {
    GenerationOutcome {
        status,
        user_id: user_id.to_string(),
        insight,
        fallback,
        tools_used: Vec::new(),
    }
}
