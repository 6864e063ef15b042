//! Insight generation
//!
//! Produces one persisted [`InsightDocument`] per user from a snapshot,
//! using the report agent when a model is available and falling back to
//! deterministic documents when it is not.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledgerlens_core::insights::InsightGenerator;
//!
//! let generator = InsightGenerator::new(repo, client, prompts, config.report);
//! let outcome = generator.generate_for_user("user-1", 60).await?;
//! println!("{}", outcome.status);
//! ```

pub mod agent;
pub mod generator;
pub mod synthesizer;
pub mod types;

pub use agent::{report_response_format, ReportAgent, ReportContext, REPORT_SCHEMA_NAME};
pub use generator::InsightGenerator;
pub use synthesizer::{
    baseline_metrics, format_currency, heuristic_document, merge_metrics, placeholder_document,
    structured_document,
};
pub use types::{
    BatchFailure, BatchOutcome, BatchSummary, FallbackReason, GenerationOutcome, GenerationStatus,
    InsightContext, InsightDocument, InsightSummary, KeyMetric, ModelMetric, ModelRecommendation,
    ModelSummary, Recommendation, StructuredInsight, DOCUMENT_VERSION,
};
