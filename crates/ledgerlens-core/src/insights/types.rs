//! Core types for insight generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::DateRange;

/// Schema version stamped on every stored document
pub const DOCUMENT_VERSION: u32 = 1;

/// The persisted insight for one user (one live document per user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightDocument {
    pub summary: InsightSummary,
    pub key_metrics: Vec<KeyMetric>,
    pub highlights: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub alerts: Vec<String>,
    pub context: InsightContext,
    pub generated_at: DateTime<Utc>,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub headline: String,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetric {
    pub label: String,
    pub value: Option<f64>,
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub detail: String,
    pub impact: Option<String>,
    pub action: Option<String>,
    pub category: Option<String>,
}

/// Figures the document was generated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightContext {
    pub period_days: u32,
    pub date_range: DateRange,
    pub transaction_count: usize,
    pub total_income: f64,
    pub total_spend: f64,
    pub net_cashflow: f64,
    /// Provenance tag of the producing engine
    pub generated_from: String,
}

// =============================================================================
// Model output
// =============================================================================

/// The report agent's structured synthesis, as the model returned it
///
/// Every field is optional on the way in: the synthesizer supplies
/// defaults and caps. `tools_used` and `iterations` are filled in by the
/// agent after parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredInsight {
    #[serde(default)]
    pub summary: Option<ModelSummary>,
    #[serde(default)]
    pub key_metrics: Option<Vec<ModelMetric>>,
    #[serde(default)]
    pub highlights: Option<Vec<String>>,
    #[serde(default)]
    pub recommendations: Option<Vec<ModelRecommendation>>,
    #[serde(default)]
    pub alerts: Option<Vec<String>>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub iterations: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSummary {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub narrative: Option<String>,
}

/// A metric as the model sent it; `value` may be a number, a string, or null
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetric {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default, rename = "displayValue")]
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRecommendation {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Which rung of the degradation ladder produced a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// No transactions in the period
    Placeholder,
    /// Baseline metrics and templated narrative, no model output
    Heuristic,
    /// Model output merged with baseline metrics
    Success,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placeholder => "placeholder",
            Self::Heuristic => "heuristic",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run with transactions ended on the heuristic rung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// No model endpoint configured
    ModelUnavailable,
    /// Iteration budget exhausted or synthesis unparseable
    NoStructuredResult,
    /// The model call failed
    ModelError(String),
}

/// Result of one `generate_for_user` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub status: GenerationStatus,
    pub user_id: String,
    /// The document that was stored
    pub insight: InsightDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
    /// Tools the agent called, in order (structured runs only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
}

/// One user that failed during a batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub user_id: String,
    pub error: String,
}

/// Per-status counts for a completed batch
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub users: usize,
    pub placeholder: usize,
    pub heuristic: usize,
    pub success: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn record(&mut self, status: GenerationStatus) {
        match status {
            GenerationStatus::Placeholder => self.placeholder += 1,
            GenerationStatus::Heuristic => self.heuristic += 1,
            GenerationStatus::Success => self.success += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Another batch was already in progress; nothing was done
    AlreadyRunning,
    Completed(BatchSummary),
}
