//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{heuristic_document, placeholder_document};
    use crate::snapshot::SnapshotBuilder;
    use chrono::{Duration, TimeZone};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn new_account(id: &str, institution: &str, account_type: AccountType, balance: f64) -> NewAccount {
        NewAccount {
            account_id: id.to_string(),
            institution_id: institution.to_string(),
            institution_name: format!("{} Bank", institution),
            name: format!("Account {}", id),
            account_type,
            subtype: None,
            current_balance: balance,
            last_sync: None,
        }
    }

    fn new_transaction(id: &str, amount: f64, date: NaiveDate, category: &[&str]) -> NewTransaction {
        NewTransaction {
            transaction_id: id.to_string(),
            account_id: "acc_1".to_string(),
            institution_id: Some("ins_1".to_string()),
            date,
            name: format!("TX {}", id),
            merchant_name: None,
            amount,
            category: category.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("ledgerlens_{}_{}.db", name, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_accounts_by_institution("u1").unwrap().is_empty());
        assert!(db.list_user_ids().unwrap().is_empty());
        assert!(db.get_insight_document("u1").unwrap().is_none());
    }

    #[test]
    fn test_accounts_grouped_by_institution() {
        let db = Database::in_memory().unwrap();
        let synced = Utc.with_ymd_and_hms(2024, 6, 29, 8, 0, 0).unwrap();

        db.upsert_account("u1", &new_account("a2", "ins_b", AccountType::Credit, 300.0))
            .unwrap();
        db.upsert_account(
            "u1",
            &NewAccount {
                last_sync: Some(synced),
                ..new_account("a1", "ins_a", AccountType::Depository, 1000.0)
            },
        )
        .unwrap();
        db.upsert_account("u1", &new_account("a3", "ins_a", AccountType::Investment, 50.0))
            .unwrap();
        db.upsert_account("u2", &new_account("z", "ins_a", AccountType::Loan, 1.0))
            .unwrap();

        let grouped = db.list_accounts_by_institution("u1").unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].institution_id, "ins_a");
        assert_eq!(grouped[0].institution_name, "ins_a Bank");
        assert_eq!(grouped[0].last_sync, Some(synced));
        let ids: Vec<&str> = grouped[0].accounts.iter().map(|a| a.account_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
        assert_eq!(grouped[1].accounts[0].account_type, AccountType::Credit);
        assert!(grouped[1].last_sync.is_none());

        assert_eq!(db.list_user_ids().unwrap(), vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn test_upsert_account_refreshes_balance() {
        let db = Database::in_memory().unwrap();
        db.upsert_account("u1", &new_account("a1", "ins", AccountType::Depository, 10.0))
            .unwrap();
        db.upsert_account("u1", &new_account("a1", "ins", AccountType::Depository, 25.5))
            .unwrap();

        let grouped = db.list_accounts_by_institution("u1").unwrap();
        assert_eq!(grouped[0].accounts.len(), 1);
        assert_eq!(grouped[0].accounts[0].current_balance, 25.5);
    }

    #[test]
    fn test_unknown_account_type_survives_roundtrip() {
        let db = Database::in_memory().unwrap();
        db.upsert_account(
            "u1",
            &new_account("a1", "ins", AccountType::Other("crypto".into()), 5.0),
        )
        .unwrap();

        let grouped = db.list_accounts_by_institution("u1").unwrap();
        assert_eq!(grouped[0].accounts[0].account_type, AccountType::Other("crypto".into()));
    }

    #[test]
    fn test_transactions_in_range_inclusive() {
        let db = Database::in_memory().unwrap();
        for (id, day) in [("t1", 1), ("t2", 10), ("t3", 20), ("t4", 30)] {
            db.insert_transaction("u1", &new_transaction(id, 10.0, date(day), &["Food"]))
                .unwrap();
        }
        db.insert_transaction("u2", &new_transaction("other", 10.0, date(10), &[]))
            .unwrap();

        let found = db
            .list_transactions_in_range("u1", DateRange::new(date(10), date(20)))
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3"]);
        assert_eq!(found[0].category, vec!["Food"]);
        assert_eq!(found[0].institution_id.as_deref(), Some("ins_1"));
    }

    #[test]
    fn test_insert_transaction_dedup() {
        let db = Database::in_memory().unwrap();
        let tx = new_transaction("t1", 42.0, date(5), &[]);

        let id = db.insert_transaction("u1", &tx).unwrap();
        assert!(id.is_some());

        // Same id for the same user is a duplicate
        let id = db.insert_transaction("u1", &tx).unwrap();
        assert!(id.is_none());

        // Same id for another user is not
        let id = db.insert_transaction("u2", &tx).unwrap();
        assert!(id.is_some());

        assert_eq!(db.count_transactions("u1").unwrap(), 1);
    }

    #[test]
    fn test_insight_document_is_overwritten() {
        let db = Database::in_memory().unwrap();
        let today = date(30);
        let builder = SnapshotBuilder::new(&db, today);

        let empty = builder.build("u1", 30).unwrap();
        let placeholder = placeholder_document(&empty, "test", Utc::now());
        db.upsert_insight_document("u1", &placeholder).unwrap();
        assert_eq!(db.get_insight_document("u1").unwrap(), Some(placeholder));

        db.insert_transaction("u1", &new_transaction("t1", 80.0, today - Duration::days(2), &["Food"]))
            .unwrap();
        let snapshot = builder.build("u1", 30).unwrap();
        let heuristic = heuristic_document(&snapshot, "test", Utc::now());
        db.upsert_insight_document("u1", &heuristic).unwrap();

        let stored = db.get_insight_document("u1").unwrap().unwrap();
        assert_eq!(stored, heuristic);
        assert_eq!(stored.context.transaction_count, 1);

        let conn = db.conn().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM insight_documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_encrypted_database() {
        use std::fs;

        let test_path = temp_path("encrypted");
        let _ = fs::remove_file(&test_path);

        {
            let db = Database::new_with_key(&test_path, Some("test-passphrase")).unwrap();
            db.upsert_account("u1", &new_account("a1", "ins", AccountType::Depository, 1.0))
                .unwrap();
        }

        // Same key reopens
        {
            let db = Database::new_with_key(&test_path, Some("test-passphrase")).unwrap();
            assert_eq!(db.list_user_ids().unwrap().len(), 1);
        }

        assert!(
            Database::new_with_key(&test_path, None).is_err(),
            "Should fail to open encrypted db without key"
        );
        assert!(
            Database::new_with_key(&test_path, Some("wrong-passphrase")).is_err(),
            "Should fail to open encrypted db with wrong key"
        );

        let _ = fs::remove_file(&test_path);
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let key1 = derive_key("my-secret").unwrap();
        let key2 = derive_key("my-secret").unwrap();
        assert_eq!(key1, key2);

        let key3 = derive_key("other-secret").unwrap();
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_encryption_required_by_default() {
        use std::fs;

        let test_path = temp_path("encryption_required");
        let _ = fs::remove_file(&test_path);

        std::env::remove_var(DB_KEY_ENV);

        let err_msg = match Database::new(&test_path) {
            Err(e) => e.to_string(),
            Ok(_) => panic!("Expected error without {}", DB_KEY_ENV),
        };
        assert!(
            err_msg.contains(DB_KEY_ENV),
            "Error should mention encryption requirement: {}",
            err_msg
        );

        assert!(Database::new_unencrypted(&test_path).is_ok());

        let _ = fs::remove_file(&test_path);
    }
}

#[cfg(test)]
mod security_tests {
    use super::*;

    #[test]
    fn test_sql_injection_in_user_id() {
        let db = Database::in_memory().unwrap();
        let malicious = "u1'; DROP TABLE transactions; --";

        let tx = NewTransaction {
            transaction_id: "t1".to_string(),
            account_id: "acc".to_string(),
            institution_id: None,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            name: "PURCHASE'; DELETE FROM accounts WHERE '1'='1".to_string(),
            merchant_name: Some("测试 🏦 \"quoted\"".to_string()),
            amount: 12.5,
            category: vec!["Food & Drink".to_string()],
        };
        db.insert_transaction(malicious, &tx).unwrap();

        let range = DateRange::ending_on(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(), 30);
        let found = db.list_transactions_in_range(malicious, range).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, tx.name);
        assert_eq!(found[0].merchant_name, tx.merchant_name);
        assert_eq!(found[0].category, tx.category);
    }
}
