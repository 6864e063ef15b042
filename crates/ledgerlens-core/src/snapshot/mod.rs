//! Snapshot Aggregation Engine
//!
//! Computes the derived analytical view the agent's tools read from:
//!
//! - **Cashflow** for the current and baseline periods
//! - **Category breakdown** with baseline deltas
//! - **Recurring charges** over a fixed 90-day window
//! - **Anomalies** and top transactions in the current period
//! - **Opportunity signals** from fixed threshold rules

mod builder;
mod cache;
mod types;

pub use builder::{
    account_summary, anomalies, anomaly_threshold, assemble, cashflow, category_breakdown,
    opportunity_signals, recurring_charges, top_transactions, Periods, SnapshotBuilder,
    MAX_ANOMALIES, MAX_CATEGORIES, MAX_RECURRING, RECENT_TRANSACTIONS, RECURRING_WINDOW_DAYS,
    TOP_TRANSACTIONS,
};
pub use cache::SnapshotCache;
pub use types::*;
