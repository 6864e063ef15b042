//! Account operations

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Account, AccountType, InstitutionAccounts};

/// An account row to insert or refresh
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub account_id: String,
    pub institution_id: String,
    pub institution_name: String,
    pub name: String,
    pub account_type: AccountType,
    pub subtype: Option<String>,
    pub current_balance: f64,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Database {
    /// Insert an account or refresh its balance and metadata
    pub fn upsert_account(&self, user_id: &str, account: &NewAccount) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO accounts (user_id, account_id, institution_id, institution_name, name,
                                  account_type, subtype, current_balance, last_sync)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, account_id) DO UPDATE SET
                institution_id = excluded.institution_id,
                institution_name = excluded.institution_name,
                name = excluded.name,
                account_type = excluded.account_type,
                subtype = excluded.subtype,
                current_balance = excluded.current_balance,
                last_sync = excluded.last_sync
            "#,
            params![
                user_id,
                account.account_id,
                account.institution_id,
                account.institution_name,
                account.name,
                account.account_type.as_str(),
                account.subtype,
                account.current_balance,
                account
                    .last_sync
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            ],
        )?;
        Ok(())
    }

    /// All of a user's accounts, grouped by institution
    ///
    /// Institutions and accounts come back in id order so snapshots built
    /// from the same rows are identical.
    pub fn list_accounts_by_institution(&self, user_id: &str) -> Result<Vec<InstitutionAccounts>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT institution_id, institution_name, last_sync,
                   account_id, name, account_type, subtype, current_balance
            FROM accounts
            WHERE user_id = ?
            ORDER BY institution_id, account_id
            "#,
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let last_sync: Option<String> = row.get(2)?;
                let account_type: String = row.get(5)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    last_sync.as_deref().and_then(parse_datetime),
                    Account {
                        account_id: row.get(3)?,
                        name: row.get(4)?,
                        account_type: account_type.parse().unwrap_or_else(|never| match never {}),
                        subtype: row.get(6)?,
                        current_balance: row.get(7)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut grouped: BTreeMap<String, InstitutionAccounts> = BTreeMap::new();
        for (institution_id, institution_name, last_sync, account) in rows {
            let entry = grouped
                .entry(institution_id.clone())
                .or_insert_with(|| InstitutionAccounts {
                    institution_id,
                    institution_name,
                    last_sync: None,
                    accounts: Vec::new(),
                });
            // Most recent sync across the institution's accounts
            entry.last_sync = entry.last_sync.max(last_sync);
            entry.accounts.push(account);
        }

        Ok(grouped.into_values().collect())
    }

    /// Users with at least one connected account
    pub fn list_user_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT user_id FROM accounts ORDER BY user_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
