//! LedgerLens Core Library
//!
//! Shared functionality for the LedgerLens insight engine:
//! - Database access and migrations (the repository adapter)
//! - CSV import for account and transaction exports
//! - Snapshot aggregation: cashflow, categories, recurring charges, anomalies
//! - Tool executor exposing snapshots to a language model
//! - Pluggable chat backends and the bounded tool-calling loop
//! - Insight generation with placeholder and heuristic fallbacks
//! - Conversational financial advisor
//! - Prompt library and layered configuration

pub mod advisor;
pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod insights;
pub mod models;
pub mod prompts;
pub mod repository;
pub mod snapshot;
pub mod tools;

/// Test utilities including the mock chat-completions server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use advisor::{AdvisorAnswer, AdvisorResponse, FinancialAdvisor, StructuredAnswer};
pub use ai::{
    AgentLoop, ChatBackend, ChatClient, ChatMessage, LoopOutcome, MockBackend,
    OpenAICompatibleBackend,
};
pub use config::{AdvisorConfig, Config, LlmConfig, ReportConfig};
pub use db::Database;
pub use error::{Error, Result};
pub use import::{import_accounts, import_transactions, ImportSummary};
pub use insights::{
    BatchOutcome, BatchSummary, GenerationOutcome, GenerationStatus, InsightDocument,
    InsightGenerator,
};
pub use models::{Account, AccountType, DateRange, InstitutionAccounts, Transaction};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use repository::Repository;
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotCache};
pub use tools::{ToolExecutor, ToolName, ToolOutput, ToolSet};
