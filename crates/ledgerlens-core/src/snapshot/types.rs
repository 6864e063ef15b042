//! Snapshot value types
//!
//! Field names serialize in camelCase; these values are handed to the
//! language model verbatim as tool results.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{DateRange, Transaction};

/// Derived analytical view of one user's finances for one period
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub user_id: String,
    pub period_days: u32,
    pub date_range: DateRange,
    pub transactions: SnapshotTransactions,
    pub account_summary: AccountSummary,
    pub cashflow: CashflowComparison,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub recurring_charges: Vec<RecurringCharge>,
    pub anomalies: Vec<Anomaly>,
    pub top_transactions: Vec<TopTransaction>,
    pub opportunity_signals: Vec<String>,
}

impl Snapshot {
    /// Number of transactions in the current period
    pub fn transaction_count(&self) -> usize {
        self.transactions.current.len()
    }

    pub fn total_income(&self) -> f64 {
        self.cashflow.current.total_income
    }

    pub fn total_spend(&self) -> f64 {
        self.cashflow.current.total_spend
    }

    pub fn net_cashflow(&self) -> f64 {
        self.cashflow.current.net_cashflow
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTransactions {
    /// Current period, newest first
    pub current: Vec<SimplifiedTransaction>,
    /// Baseline period, newest first
    pub baseline: Vec<SimplifiedTransaction>,
    /// First 20 of `current`
    pub recent: Vec<SimplifiedTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedTransaction {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub name: String,
    pub merchant: Option<String>,
    pub category: Vec<String>,
    pub institution_id: Option<String>,
    pub account_id: String,
}

impl From<&Transaction> for SimplifiedTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.transaction_id.clone(),
            date: tx.date,
            amount: tx.amount,
            name: tx.name.clone(),
            merchant: tx.merchant_name.clone(),
            category: tx.category.clone(),
            institution_id: tx.institution_id.clone(),
            account_id: tx.account_id.clone(),
        }
    }
}

/// Assets, debt, and net worth across all connected accounts
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub total_assets: f64,
    pub total_debt: f64,
    /// Always `total_assets - total_debt`
    pub net_worth: f64,
    pub institutions: Vec<InstitutionSummary>,
    pub accounts: Vec<AccountBalance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionSummary {
    pub institution_id: String,
    pub institution_name: String,
    pub account_count: usize,
    pub asset_total: f64,
    pub debt_total: f64,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub institution_id: String,
    pub institution_name: String,
    pub account_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub subtype: Option<String>,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cashflow {
    pub total_income: f64,
    pub total_spend: f64,
    /// Always `total_income - total_spend`
    pub net_cashflow: f64,
    /// Percent of income kept; 0 when there is no income
    pub savings_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashflowComparison {
    pub current: Cashflow,
    pub baseline: Cashflow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: String,
    pub total: f64,
    pub count: usize,
    pub average: f64,
    pub baseline_total: f64,
    pub change: f64,
    /// `None` when there was no baseline spend to compare against
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringCharge {
    pub merchant: String,
    pub average_amount: f64,
    /// Number of charges in the window
    pub transactions: usize,
    pub total_spent: f64,
    pub is_consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub date: NaiveDate,
    pub amount: f64,
    pub name: String,
    pub merchant: Option<String>,
    pub category: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub name: String,
    pub merchant: Option<String>,
    pub category: String,
}
