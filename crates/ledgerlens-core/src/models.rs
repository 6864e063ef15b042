//! Domain models for LedgerLens

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A posted transaction as synced from the banking aggregator
///
/// Sign convention: positive amounts are outflows (spend), negative amounts
/// are inflows (income).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: f64,
    pub date: NaiveDate,
    /// Raw transaction name from the statement
    pub name: String,
    pub merchant_name: Option<String>,
    /// Category path, most general first. The first element is the primary category.
    #[serde(default)]
    pub category: Vec<String>,
    pub institution_id: Option<String>,
}

impl Transaction {
    /// Primary category, or "Uncategorized" when none is set
    pub fn primary_category(&self) -> &str {
        self.category
            .first()
            .map(String::as_str)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED)
    }

    /// Merchant label used for grouping: merchant name, else transaction name
    pub fn merchant_label(&self) -> Option<&str> {
        self.merchant_name
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| Some(self.name.as_str()).filter(|n| !n.is_empty()))
    }

    /// True for outflows (amount > 0)
    pub fn is_spend(&self) -> bool {
        self.amount > 0.0
    }
}

/// Category label for transactions without one
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Account types reported by the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Depository,
    Investment,
    Brokerage,
    CashManagement,
    Credit,
    Loan,
    Mortgage,
    #[serde(untagged)]
    Other(String),
}

/// How an account contributes to net worth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountClass {
    Asset,
    Debt,
    /// Contributes to neither total
    Ignored,
}

impl AccountType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Depository => "depository",
            Self::Investment => "investment",
            Self::Brokerage => "brokerage",
            Self::CashManagement => "cash_management",
            Self::Credit => "credit",
            Self::Loan => "loan",
            Self::Mortgage => "mortgage",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn class(&self) -> AccountClass {
        match self {
            Self::Depository | Self::Investment | Self::Brokerage | Self::CashManagement => {
                AccountClass::Asset
            }
            Self::Credit | Self::Loan | Self::Mortgage => AccountClass::Debt,
            Self::Other(_) => AccountClass::Ignored,
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "depository" => Self::Depository,
            "investment" => Self::Investment,
            "brokerage" => Self::Brokerage,
            "cash_management" => Self::CashManagement,
            "credit" => Self::Credit,
            "loan" => Self::Loan,
            "mortgage" => Self::Mortgage,
            other => Self::Other(other.to_string()),
        })
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A connected account with its current balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub subtype: Option<String>,
    pub current_balance: f64,
}

/// Accounts held at one institution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionAccounts {
    pub institution_id: String,
    pub institution_name: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub accounts: Vec<Account>,
}

/// Inclusive calendar-day range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days`-day window ending on (and including) `end`
    pub fn ending_on(end: NaiveDate, days: u32) -> Self {
        let days = days.max(1);
        Self {
            start: end - Duration::days(i64::from(days) - 1),
            end,
        }
    }

    /// The window of the same length immediately before this one
    pub fn preceding(&self) -> Self {
        let end = self.start - Duration::days(1);
        Self::ending_on(end, self.days())
    }

    /// Number of days covered, inclusive
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1).max(0) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
