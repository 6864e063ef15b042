//! Integration tests for ledgerlens-core
//!
//! These tests exercise the full import → snapshot → agent → stored document
//! workflow against a real database and a mock chat-completions server.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use ledgerlens_core::{
    advisor::AdvisorAnswer,
    ai::{ChatClient, ToolCall},
    config::{AdvisorConfig, LlmConfig, ReportConfig},
    db::Database,
    import::{import_accounts, import_transactions},
    insights::{BatchOutcome, FallbackReason, GenerationStatus},
    test_utils::{MockChatServer, MockReply},
    FinancialAdvisor, InsightGenerator, PromptLibrary, SnapshotBuilder,
};

const ACCOUNTS_CSV: &str = "\
account_id,institution_id,institution_name,name,type,subtype,current_balance,last_sync
acc_chk,ins_1,First Bank,Checking,depository,checking,5000.00,2024-06-29 08:00:00
acc_visa,ins_1,First Bank,Visa,credit,credit card,450.00,2024-06-29 08:00:00";

const TRANSACTIONS_CSV: &str = "\
transaction_id,account_id,institution_id,date,name,merchant_name,amount,category
tx_rent,acc_chk,ins_1,2024-06-25,RENT JUNE,,1200.00,Rent
tx_coffee,acc_visa,ins_1,2024-06-26,SQ *BLUE BOTTLE,Blue Bottle,4.50,Food and Drink > Coffee Shop
tx_pay,acc_chk,ins_1,2024-06-27,PAYROLL,,-3000.00,
tx_old,acc_chk,ins_1,2024-04-01,RENT APRIL,,1200.00,Rent";

const REPORT_JSON: &str = r#"{
    "summary": {"headline": "Rent dominates spending", "narrative": "Rent was almost all of June's spend."},
    "key_metrics": [
        {"label": "NET WORTH", "value": 1, "displayValue": "$1"},
        {"label": "Rent share", "value": "99.6%", "displayValue": null}
    ],
    "highlights": ["You kept 60% of income"],
    "recommendations": [{"title": "Automate savings", "detail": "Move $500 on payday", "impact": "high", "action": "Set up a transfer", "category": null}],
    "alerts": []
}"#;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn seeded_db() -> Database {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    import_accounts(&db, "u1", ACCOUNTS_CSV.as_bytes()).expect("Failed to import accounts");
    import_transactions(&db, "u1", TRANSACTIONS_CSV.as_bytes())
        .expect("Failed to import transactions");
    db
}

fn client_for(server: &MockChatServer) -> ChatClient {
    let config = LlmConfig {
        base_url: Some(server.url()),
        model: Some("test-model".to_string()),
        api_key: Some("sk-test".to_string()),
        timeout_secs: 5,
    };
    ChatClient::from_config(&config)
        .expect("Failed to build client")
        .expect("Client should be configured")
}

fn generator(db: &Database, client: Option<ChatClient>) -> InsightGenerator {
    InsightGenerator::new(
        Arc::new(db.clone()),
        client,
        PromptLibrary::embedded_only().unwrap(),
        ReportConfig::default(),
    )
    .with_today(today())
}

// =============================================================================
// Snapshot
// =============================================================================

#[test]
fn test_snapshot_from_imported_data() {
    let db = seeded_db();
    let snapshot = SnapshotBuilder::new(&db, today()).build("u1", 30).unwrap();

    assert_eq!(snapshot.transaction_count(), 3);
    assert_eq!(snapshot.total_spend(), 1204.5);
    assert_eq!(snapshot.total_income(), 3000.0);
    assert_eq!(snapshot.net_cashflow(), 1795.5);
    assert_eq!(snapshot.account_summary.total_assets, 5000.0);
    assert_eq!(snapshot.account_summary.total_debt, 450.0);
    assert_eq!(snapshot.account_summary.net_worth, 4550.0);
    assert_eq!(snapshot.category_breakdown[0].category, "Rent");
    assert_eq!(snapshot.category_breakdown[1].category, "Food and Drink");
}

// =============================================================================
// Insight generation
// =============================================================================

#[tokio::test]
async fn test_generation_without_model_is_heuristic() {
    let db = seeded_db();
    let outcome = generator(&db, None).generate_for_user("u1", 30).await.unwrap();

    assert_eq!(outcome.status, GenerationStatus::Heuristic);
    assert_eq!(outcome.fallback, Some(FallbackReason::ModelUnavailable));

    let stored = db.get_insight_document("u1").unwrap().unwrap();
    assert_eq!(stored.summary, outcome.insight.summary);
    assert!(stored.summary.narrative.contains("positive"));
    assert_eq!(stored.key_metrics.len(), 7);
    assert_eq!(stored.context.generated_from, "ledgerlens-agent-v1");
}

#[tokio::test]
async fn test_generation_with_model_is_structured() {
    let db = seeded_db();
    let server = MockChatServer::start(vec![
        MockReply::tool_calls(vec![ToolCall::new("call_1", "get_cashflow_summary", "{}")]),
        MockReply::content("I have what I need."),
        MockReply::content(REPORT_JSON),
    ])
    .await;

    let outcome = generator(&db, Some(client_for(&server)))
        .generate_for_user("u1", 30)
        .await
        .unwrap();

    assert_eq!(outcome.status, GenerationStatus::Success);
    assert_eq!(outcome.tools_used, vec!["get_cashflow_summary"]);

    let stored = db.get_insight_document("u1").unwrap().unwrap();
    assert_eq!(stored.summary.headline, "Rent dominates spending");
    // Seven baseline metrics; the duplicate "NET WORTH" is dropped
    assert_eq!(stored.key_metrics.len(), 8);
    assert_eq!(stored.key_metrics[0].value, Some(4550.0));
    let rent_share = &stored.key_metrics[7];
    assert_eq!(rent_share.label, "Rent share");
    assert_eq!(rent_share.value, Some(99.6));
    assert_eq!(stored.recommendations[0].category, None);

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0]["model"], "test-model");
    assert_eq!(requests[0]["tools"].as_array().unwrap().len(), 6);
    let tool_message = &requests[1]["messages"][3];
    assert_eq!(tool_message["role"], "tool");
    assert_eq!(tool_message["tool_call_id"], "call_1");
    assert!(tool_message["content"]
        .as_str()
        .unwrap()
        .contains("\"netCashflow\":1795.5"));
    assert_eq!(
        requests[2]["response_format"]["json_schema"]["name"],
        "ledgerlens_insight_response"
    );
    assert!(requests[2].get("tools").is_none());
    assert!(server
        .authorization_headers()
        .iter()
        .all(|h| h == "Bearer sk-test"));
}

#[tokio::test]
async fn test_model_failure_still_stores_heuristic() {
    let db = seeded_db();
    let server = MockChatServer::start(vec![MockReply::Status(503)]).await;

    let outcome = generator(&db, Some(client_for(&server)))
        .generate_for_user("u1", 30)
        .await
        .unwrap();

    assert_eq!(outcome.status, GenerationStatus::Heuristic);
    assert!(matches!(outcome.fallback, Some(FallbackReason::ModelError(_))));
    assert!(db.get_insight_document("u1").unwrap().is_some());
}

#[tokio::test]
async fn test_endless_tool_calls_fall_back_to_heuristic() {
    let db = seeded_db();
    let server = MockChatServer::start_with_fallback(
        vec![],
        Some(MockReply::tool_calls(vec![ToolCall::new(
            "loop",
            "get_opportunity_signals",
            "{}",
        )])),
    )
    .await;

    let outcome = generator(&db, Some(client_for(&server)))
        .generate_for_user("u1", 30)
        .await
        .unwrap();

    assert_eq!(outcome.status, GenerationStatus::Heuristic);
    assert_eq!(outcome.fallback, Some(FallbackReason::NoStructuredResult));
    assert_eq!(server.requests().len(), ReportConfig::default().max_iterations);
}

#[tokio::test]
async fn test_slow_model_times_out_to_heuristic() {
    let db = seeded_db();
    let server = MockChatServer::start(vec![MockReply::Delayed(
        Duration::from_secs(5),
        Box::new(MockReply::content(REPORT_JSON)),
    )])
    .await;

    let config = LlmConfig {
        base_url: Some(server.url()),
        model: Some("test-model".to_string()),
        api_key: None,
        timeout_secs: 1,
    };
    let client = ChatClient::from_config(&config).unwrap();

    let outcome = generator(&db, client).generate_for_user("u1", 30).await.unwrap();
    assert_eq!(outcome.status, GenerationStatus::Heuristic);
    assert!(matches!(outcome.fallback, Some(FallbackReason::ModelError(_))));
}

#[tokio::test]
async fn test_batch_generation_covers_every_user() {
    let db = seeded_db();
    // u2 has an account but no transactions
    import_accounts(&db, "u2", ACCOUNTS_CSV.as_bytes()).unwrap();

    let outcome = generator(&db, None).generate_for_all_users(30).await.unwrap();
    let BatchOutcome::Completed(summary) = outcome else {
        panic!("batch should run");
    };
    assert_eq!(summary.users, 2);
    assert_eq!(summary.heuristic, 1);
    assert_eq!(summary.placeholder, 1);
    assert!(summary.failures.is_empty());

    let placeholder = db.get_insight_document("u2").unwrap().unwrap();
    assert!(placeholder.key_metrics.is_empty());
    assert_eq!(placeholder.summary.headline, "Connect accounts to unlock insights");
}

// =============================================================================
// Advisor
// =============================================================================

#[tokio::test]
async fn test_advisor_answers_with_tools() {
    let db = seeded_db();
    let server = MockChatServer::start(vec![
        MockReply::tool_calls(vec![ToolCall::new(
            "call_goal",
            "calculate_savings_goal_timeline",
            r#"{"user_id": "someone-else", "goal_amount": 10000, "period_days": 30}"#,
        )]),
        MockReply::content("About three months."),
        MockReply::content(
            r#"{
                "summary": "You can reach $10,000 in about 2.8 months.",
                "analysis": {"key_metrics": [], "insights": ["Savings pace is strong"]},
                "recommendations": [{"action": "Keep rent flat", "priority": "high", "expected_impact": "Stay on pace"}]
            }"#,
        ),
    ])
    .await;

    let advisor = FinancialAdvisor::new(
        Arc::new(db.clone()),
        Some(client_for(&server)),
        PromptLibrary::embedded_only().unwrap(),
        AdvisorConfig::default(),
    )
    .with_today(today());

    let response = advisor
        .answer_question("u1", "When will I have $10,000 saved?", &[])
        .await
        .unwrap();

    let AdvisorAnswer::Structured(answer) = &response.answer else {
        panic!("expected structured answer, got {:?}", response.answer);
    };
    assert_eq!(answer.tools_used, vec!["calculate_savings_goal_timeline"]);
    assert!(answer.summary.contains("2.8"));

    // The tool ran against u1's data, not the id the model sent
    let requests = server.requests();
    let tool_result = requests[1]["messages"][3]["content"].as_str().unwrap();
    assert!(tool_result.contains("\"currentSavings\":5000.0"));
    assert!(tool_result.contains("\"monthsToGoal\":2.8"));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["response_type"], "structured");
    assert_eq!(json["query"], "When will I have $10,000 saved?");
}
