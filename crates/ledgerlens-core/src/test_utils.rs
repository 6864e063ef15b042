//! Test utilities for ledgerlens-core
//!
//! This module provides testing infrastructure: transaction and account
//! fixtures, an in-memory [`Repository`], and a mock chat-completions server
//! that speaks the `/v1/chat/completions` wire format.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::{ChatMessage, ToolCall};
use crate::error::{Error, Result};
use crate::insights::InsightDocument;
use crate::models::{Account, AccountType, DateRange, InstitutionAccounts, Transaction};
use crate::repository::Repository;

/// Statement name shared by every `spend` fixture
pub const FIXTURE_NAME: &str = "POS PURCHASE";

/// Account id shared by every `spend` fixture
pub const FIXTURE_ACCOUNT: &str = "acc_checking";

/// A transaction with no merchant name
///
/// Positive amounts are spend, negative amounts are income.
pub fn spend(id: &str, amount: f64, date: NaiveDate, categories: &[&str]) -> Transaction {
    Transaction {
        transaction_id: id.to_string(),
        account_id: FIXTURE_ACCOUNT.to_string(),
        amount,
        date,
        name: FIXTURE_NAME.to_string(),
        merchant_name: None,
        category: categories.iter().map(|c| c.to_string()).collect(),
        institution_id: Some("ins_fixture".to_string()),
    }
}

pub fn account(id: &str, account_type: AccountType, balance: f64) -> Account {
    Account {
        account_id: id.to_string(),
        name: format!("Account {}", id),
        account_type,
        subtype: None,
        current_balance: balance,
    }
}

pub fn institution(id: &str, accounts: Vec<Account>) -> InstitutionAccounts {
    InstitutionAccounts {
        institution_id: id.to_string(),
        institution_name: format!("Bank {}", id),
        last_sync: None,
        accounts,
    }
}

#[derive(Default)]
struct RepoState {
    transactions: HashMap<String, Vec<Transaction>>,
    // Keyed by user; only users with institutions are listed for batches
    institutions: BTreeMap<String, Vec<InstitutionAccounts>>,
    documents: HashMap<String, InsightDocument>,
    transaction_reads: usize,
    fail_reads: bool,
    fail_writes: HashSet<String>,
}

/// In-memory repository with failure injection
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<RepoState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RepoState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_transaction(&self, user_id: &str, transaction: Transaction) {
        self.state()
            .transactions
            .entry(user_id.to_string())
            .or_default()
            .push(transaction);
    }

    pub fn add_institution(&self, user_id: &str, institution: InstitutionAccounts) {
        self.state()
            .institutions
            .entry(user_id.to_string())
            .or_default()
            .push(institution);
    }

    /// Number of `find_transactions` calls so far
    pub fn transaction_reads(&self) -> usize {
        self.state().transaction_reads
    }

    /// Make every read fail until reset
    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    /// Make document writes for `user_id` fail
    pub fn fail_writes_for(&self, user_id: &str) {
        self.state().fail_writes.insert(user_id.to_string());
    }

    pub fn stored_document(&self, user_id: &str) -> Option<InsightDocument> {
        self.state().documents.get(user_id).cloned()
    }
}

fn simulated(what: &str) -> Error {
    Error::Io(std::io::Error::other(format!("simulated {} failure", what)))
}

impl Repository for InMemoryRepository {
    fn find_transactions(&self, user_id: &str, range: DateRange) -> Result<Vec<Transaction>> {
        let mut state = self.state();
        state.transaction_reads += 1;
        if state.fail_reads {
            return Err(simulated("read"));
        }
        let mut found: Vec<Transaction> = state
            .transactions
            .get(user_id)
            .map(|txs| {
                txs.iter()
                    .filter(|tx| range.contains(tx.date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|tx| tx.date);
        Ok(found)
    }

    fn find_accounts(&self, user_id: &str) -> Result<Vec<InstitutionAccounts>> {
        let state = self.state();
        if state.fail_reads {
            return Err(simulated("read"));
        }
        Ok(state.institutions.get(user_id).cloned().unwrap_or_default())
    }

    fn upsert_insight_document(&self, user_id: &str, document: &InsightDocument) -> Result<()> {
        let mut state = self.state();
        if state.fail_writes.contains(user_id) {
            return Err(simulated("write"));
        }
        state.documents.insert(user_id.to_string(), document.clone());
        Ok(())
    }

    fn get_insight_document(&self, user_id: &str) -> Result<Option<InsightDocument>> {
        let state = self.state();
        if state.fail_reads {
            return Err(simulated("read"));
        }
        Ok(state.documents.get(user_id).cloned())
    }

    fn list_user_ids(&self) -> Result<Vec<String>> {
        let state = self.state();
        if state.fail_reads {
            return Err(simulated("read"));
        }
        Ok(state.institutions.keys().cloned().collect())
    }
}

/// One scripted response from [`MockChatServer`]
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with this assistant message as the only choice
    Message(ChatMessage),
    /// Bare error status
    Status(u16),
    /// Wait, then send the inner reply
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn content(text: &str) -> Self {
        MockReply::Message(ChatMessage::assistant(text))
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        MockReply::Message(ChatMessage::assistant_tool_calls(None, calls))
    }
}

#[derive(Default)]
struct ServerState {
    replies: VecDeque<MockReply>,
    otherwise: Option<MockReply>,
    requests: Vec<Value>,
    authorization: Vec<String>,
}

type SharedState = Arc<Mutex<ServerState>>;

/// Mock chat-completions server for testing
///
/// Replies are served in order; once the script runs out the server answers
/// with the fallback reply, or 500 when none was given.
pub struct MockChatServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockChatServer {
    /// Start the mock server on an available port
    pub async fn start(replies: Vec<MockReply>) -> Self {
        Self::start_with_fallback(replies, None).await
    }

    pub async fn start_with_fallback(replies: Vec<MockReply>, otherwise: Option<MockReply>) -> Self {
        let state: SharedState = Arc::new(Mutex::new(ServerState {
            replies: replies.into(),
            otherwise,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// JSON bodies received so far, in order
    pub fn requests(&self) -> Vec<Value> {
        self.state.lock().unwrap().requests.clone()
    }

    /// `Authorization` header values received so far
    pub fn authorization_headers(&self) -> Vec<String> {
        self.state.lock().unwrap().authorization.clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let next = {
        let mut state = state.lock().unwrap();
        state.requests.push(body);
        if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            state.authorization.push(value.to_string());
        }
        state
            .replies
            .pop_front()
            .or_else(|| state.otherwise.clone())
    };

    let mut reply = next.unwrap_or(MockReply::Status(500));
    loop {
        match reply {
            MockReply::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
            MockReply::Status(code) => {
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                return (status, "mock chat server error").into_response();
            }
            MockReply::Message(message) => {
                return Json(json!({
                    "id": "chatcmpl-mock",
                    "object": "chat.completion",
                    "choices": [{
                        "index": 0,
                        "message": message,
                        "finish_reason": "stop"
                    }]
                }))
                .into_response();
            }
        }
    }
}
