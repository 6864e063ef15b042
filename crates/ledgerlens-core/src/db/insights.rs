//! Insight document storage

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::insights::InsightDocument;

impl Database {
    /// Store a user's insight document, replacing any previous one
    pub fn upsert_insight_document(&self, user_id: &str, document: &InsightDocument) -> Result<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(document)?;
        conn.execute(
            r#"
            INSERT INTO insight_documents (user_id, document, generated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                document = excluded.document,
                generated_at = excluded.generated_at,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![user_id, json, document.generated_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// The latest insight document for a user, if one has been generated
    pub fn get_insight_document(&self, user_id: &str) -> Result<Option<InsightDocument>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT document FROM insight_documents WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
