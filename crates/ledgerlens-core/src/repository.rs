//! Repository boundary between the insight engine and storage
//!
//! The snapshot builder, tool executor, and generator only ever see this
//! trait. `Database` is the production implementation; tests can swap in
//! their own.

use crate::db::Database;
use crate::error::Result;
use crate::insights::InsightDocument;
use crate::models::{DateRange, InstitutionAccounts, Transaction};

pub trait Repository: Send + Sync {
    /// Transactions for a user with dates inside `range` (inclusive)
    fn find_transactions(&self, user_id: &str, range: DateRange) -> Result<Vec<Transaction>>;

    /// A user's accounts grouped by institution
    fn find_accounts(&self, user_id: &str) -> Result<Vec<InstitutionAccounts>>;

    /// Replace the user's insight document
    fn upsert_insight_document(&self, user_id: &str, document: &InsightDocument) -> Result<()>;

    fn get_insight_document(&self, user_id: &str) -> Result<Option<InsightDocument>>;

    /// Users eligible for batch generation
    fn list_user_ids(&self) -> Result<Vec<String>>;
}

impl Repository for Database {
    fn find_transactions(&self, user_id: &str, range: DateRange) -> Result<Vec<Transaction>> {
        self.list_transactions_in_range(user_id, range)
    }

    fn find_accounts(&self, user_id: &str) -> Result<Vec<InstitutionAccounts>> {
        self.list_accounts_by_institution(user_id)
    }

    fn upsert_insight_document(&self, user_id: &str, document: &InsightDocument) -> Result<()> {
        Database::upsert_insight_document(self, user_id, document)
    }

    fn get_insight_document(&self, user_id: &str) -> Result<Option<InsightDocument>> {
        Database::get_insight_document(self, user_id)
    }

    fn list_user_ids(&self) -> Result<Vec<String>> {
        Database::list_user_ids(self)
    }
}
