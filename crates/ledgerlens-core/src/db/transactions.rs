//! Transaction operations

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_date, Database};
use crate::error::Result;
use crate::models::{DateRange, Transaction};

/// A transaction row to insert
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub institution_id: Option<String>,
    pub date: NaiveDate,
    pub name: String,
    pub merchant_name: Option<String>,
    pub amount: f64,
    pub category: Vec<String>,
}

impl Database {
    /// Insert a transaction, skipping duplicates
    ///
    /// Returns the new row id, or `None` if the user already has a
    /// transaction with this id.
    pub fn insert_transaction(&self, user_id: &str, tx: &NewTransaction) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let category = serde_json::to_string(&tx.category)?;

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO transactions
                (user_id, transaction_id, account_id, institution_id, date, name,
                 merchant_name, amount, category)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                tx.transaction_id,
                tx.account_id,
                tx.institution_id,
                tx.date.format("%Y-%m-%d").to_string(),
                tx.name,
                tx.merchant_name,
                tx.amount,
                category,
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// A user's transactions within an inclusive date range, oldest first
    pub fn list_transactions_in_range(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT transaction_id, account_id, institution_id, date, name,
                   merchant_name, amount, category
            FROM transactions
            WHERE user_id = ? AND date >= ? AND date <= ?
            ORDER BY date, id
            "#,
        )?;

        let transactions = stmt
            .query_map(
                params![
                    user_id,
                    range.start.format("%Y-%m-%d").to_string(),
                    range.end.format("%Y-%m-%d").to_string(),
                ],
                |row| {
                    let date: String = row.get(3)?;
                    let category: String = row.get(7)?;
                    Ok(Transaction {
                        transaction_id: row.get(0)?,
                        account_id: row.get(1)?,
                        institution_id: row.get(2)?,
                        date: parse_date(&date)?,
                        name: row.get(4)?,
                        merchant_name: row.get(5)?,
                        amount: row.get(6)?,
                        category: serde_json::from_str(&category).unwrap_or_default(),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count a user's transactions
    pub fn count_transactions(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
