//! CSV import for account and transaction exports
//!
//! Accounts CSV columns:
//! `account_id,institution_id,institution_name,name,type,subtype,current_balance,last_sync`
//!
//! Transactions CSV columns:
//! `transaction_id,account_id,institution_id,date,name,merchant_name,amount,category`
//!
//! Amounts follow the aggregator convention (positive = spend). Category
//! paths are written most general first, separated by `>`. Rows without a
//! transaction id get a SHA-256 hash of their content, so re-importing the
//! same export is a no-op.

use std::io::Read;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::db::{parse_datetime, Database, NewAccount, NewTransaction};
use crate::error::{Error, Result};

/// Category path separator inside the `category` column
const CATEGORY_SEPARATOR: char = '>';

/// Counts from one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub parsed: usize,
    pub imported: usize,
    /// Rows already present (transactions only)
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct AccountRow {
    account_id: String,
    institution_id: String,
    institution_name: String,
    name: String,
    #[serde(rename = "type")]
    account_type: String,
    #[serde(default)]
    subtype: Option<String>,
    current_balance: String,
    #[serde(default)]
    last_sync: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    #[serde(default)]
    transaction_id: Option<String>,
    account_id: String,
    #[serde(default)]
    institution_id: Option<String>,
    date: String,
    name: String,
    #[serde(default)]
    merchant_name: Option<String>,
    amount: String,
    #[serde(default)]
    category: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Errors carry the 1-based line number (header is line 1)
fn row_error(line: usize, message: impl std::fmt::Display) -> Error {
    Error::Import(format!("line {}: {}", line, message))
}

/// Parse an accounts export
pub fn parse_accounts<R: Read>(reader: R) -> Result<Vec<NewAccount>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut accounts = Vec::new();
    for (i, result) in rdr.deserialize::<AccountRow>().enumerate() {
        let line = i + 2;
        let row = result?;

        if row.account_id.is_empty() {
            return Err(row_error(line, "missing account_id"));
        }
        let current_balance = parse_amount(&row.current_balance).map_err(|e| row_error(line, e))?;
        let last_sync = match non_empty(row.last_sync) {
            Some(s) => Some(
                parse_datetime(&s)
                    .ok_or_else(|| row_error(line, format!("unable to parse last_sync: {}", s)))?,
            ),
            None => None,
        };

        accounts.push(NewAccount {
            account_id: row.account_id,
            institution_id: row.institution_id,
            institution_name: row.institution_name,
            name: row.name,
            account_type: row.account_type.parse().unwrap_or_else(|never| match never {}),
            subtype: non_empty(row.subtype),
            current_balance,
            last_sync,
        });
    }

    debug!("Parsed {} accounts", accounts.len());
    Ok(accounts)
}

/// Parse a transactions export
pub fn parse_transactions<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut transactions = Vec::new();
    for (i, result) in rdr.deserialize::<TransactionRow>().enumerate() {
        let line = i + 2;
        let row = result?;

        let date = parse_date(&row.date).map_err(|e| row_error(line, e))?;
        let amount = parse_amount(&row.amount).map_err(|e| row_error(line, e))?;
        let category: Vec<String> = row
            .category
            .as_deref()
            .unwrap_or_default()
            .split(CATEGORY_SEPARATOR)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();

        let transaction_id = non_empty(row.transaction_id)
            .unwrap_or_else(|| generate_hash(&row.account_id, &date, &row.name, amount));

        transactions.push(NewTransaction {
            transaction_id,
            account_id: row.account_id,
            institution_id: non_empty(row.institution_id),
            date,
            name: row.name,
            merchant_name: non_empty(row.merchant_name),
            amount,
            category,
        });
    }

    debug!("Parsed {} transactions", transactions.len());
    Ok(transactions)
}

/// Import an accounts export for a user, refreshing existing accounts
pub fn import_accounts<R: Read>(db: &Database, user_id: &str, reader: R) -> Result<ImportSummary> {
    let accounts = parse_accounts(reader)?;
    for account in &accounts {
        db.upsert_account(user_id, account)?;
    }

    let summary = ImportSummary {
        parsed: accounts.len(),
        imported: accounts.len(),
        skipped: 0,
    };
    info!(user_id = %user_id, imported = summary.imported, "Imported accounts");
    Ok(summary)
}

/// Import a transactions export for a user, skipping duplicates
pub fn import_transactions<R: Read>(
    db: &Database,
    user_id: &str,
    reader: R,
) -> Result<ImportSummary> {
    let transactions = parse_transactions(reader)?;
    let mut summary = ImportSummary {
        parsed: transactions.len(),
        ..Default::default()
    };

    for tx in &transactions {
        match db.insert_transaction(user_id, tx)? {
            Some(_) => summary.imported += 1,
            None => summary.skipped += 1,
        }
    }

    info!(
        user_id = %user_id,
        imported = summary.imported,
        skipped = summary.skipped,
        "Imported transactions"
    );
    Ok(summary)
}

/// Stable id for rows exported without one
fn generate_hash(account_id: &str, date: &NaiveDate, name: &str, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(amount.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Parse a date string in various common formats
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))
}
