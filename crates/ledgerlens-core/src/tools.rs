//! Tool implementations for the LedgerLens agents
//!
//! These tools are read-only queries over a [`Snapshot`]. They are used by:
//! 1. The report agent (autonomous insight generation)
//! 2. The financial advisor (conversational Q&A)
//!
//! Each tool resolves its snapshot through the pass's [`SnapshotCache`] and
//! never modifies anything. Every failure (unknown tool, missing argument,
//! repository error) is returned as a [`ToolOutput::Failure`] so the model
//! can see it and adjust.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ai::{ToolDefinition, ToolDispatcher};
use crate::snapshot::{
    AccountSummary, Anomaly, CategoryBreakdown, RecurringCharge, Snapshot, SnapshotCache,
    TopTransaction,
};

/// Default `period_days` when neither the call nor the session supplies one
pub const DEFAULT_PERIOD_DAYS: u32 = 60;
/// Default category count for trend/category tools
pub const DEFAULT_TOP_CATEGORIES: usize = 10;
/// Default recurring lookback echoed by the recurring tools
pub const DEFAULT_WINDOW_DAYS: u32 = 90;
/// Default row limit for anomaly tools
pub const DEFAULT_LIMIT: usize = 5;

// =============================================================================
// Tool output
// =============================================================================

/// Result of one tool call, as seen by the model
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Success(Value),
    Failure(String),
}

impl ToolOutput {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutput::Success(_))
    }

    /// JSON payload; failures become `{"error": "..."}`
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutput::Success(value) => value.clone(),
            ToolOutput::Failure(error) => json!({ "error": error }),
        }
    }

    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }

    fn from_result<T: Serialize>(result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => ToolOutput::Success(value),
            Err(e) => ToolOutput::Failure(format!("Tool execution failed: {}", e)),
        }
    }
}

// =============================================================================
// Tool names and sets
// =============================================================================

/// Every tool either agent can call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    // Report agent
    GetAccountOverview,
    GetCashflowSummary,
    GetSpendingTrends,
    GetRecurringExpenses,
    GetAnomalyTransactions,
    GetOpportunitySignals,
    // Advisor
    GetAccountBalances,
    GetIncomeAndSpending,
    GetSpendingByCategory,
    GetRecurringSubscriptions,
    GetUnusualTransactions,
    CalculateSavingsGoalTimeline,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetAccountOverview => "get_account_overview",
            Self::GetCashflowSummary => "get_cashflow_summary",
            Self::GetSpendingTrends => "get_spending_trends",
            Self::GetRecurringExpenses => "get_recurring_expenses",
            Self::GetAnomalyTransactions => "get_anomaly_transactions",
            Self::GetOpportunitySignals => "get_opportunity_signals",
            Self::GetAccountBalances => "get_account_balances",
            Self::GetIncomeAndSpending => "get_income_and_spending",
            Self::GetSpendingByCategory => "get_spending_by_category",
            Self::GetRecurringSubscriptions => "get_recurring_subscriptions",
            Self::GetUnusualTransactions => "get_unusual_transactions",
            Self::CalculateSavingsGoalTimeline => "calculate_savings_goal_timeline",
        }
    }

    pub fn all() -> &'static [ToolName] {
        &[
            Self::GetAccountOverview,
            Self::GetCashflowSummary,
            Self::GetSpendingTrends,
            Self::GetRecurringExpenses,
            Self::GetAnomalyTransactions,
            Self::GetOpportunitySignals,
            Self::GetAccountBalances,
            Self::GetIncomeAndSpending,
            Self::GetSpendingByCategory,
            Self::GetRecurringSubscriptions,
            Self::GetUnusualTransactions,
            Self::CalculateSavingsGoalTimeline,
        ]
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == name)
    }

    fn set(&self) -> ToolSet {
        match self {
            Self::GetAccountOverview
            | Self::GetCashflowSummary
            | Self::GetSpendingTrends
            | Self::GetRecurringExpenses
            | Self::GetAnomalyTransactions
            | Self::GetOpportunitySignals => ToolSet::Report,
            _ => ToolSet::Advisor,
        }
    }

    fn definition(&self) -> ToolDefinition {
        let (description, schema): (&str, Value) = match self {
            Self::GetAccountOverview => (
                "Summarize balances, debt, and net worth across connected accounts.",
                schemars::schema_for!(PeriodParams).into(),
            ),
            Self::GetCashflowSummary => (
                "Return income, spending, net cashflow, and savings rate with baseline comparison.",
                schemars::schema_for!(PeriodParams).into(),
            ),
            Self::GetSpendingTrends => (
                "Fetch top spending categories and trend changes from the prior period.",
                schemars::schema_for!(TopCategoriesParams).into(),
            ),
            Self::GetRecurringExpenses => (
                "Identify recurring merchants and their average spend.",
                schemars::schema_for!(RecurringParams).into(),
            ),
            Self::GetAnomalyTransactions => (
                "List unusually large transactions that exceed statistical thresholds.",
                schemars::schema_for!(LimitParams).into(),
            ),
            Self::GetOpportunitySignals => (
                "Surface heuristic insights such as high recurring spend or low savings rate.",
                schemars::schema_for!(PeriodParams).into(),
            ),
            Self::GetAccountBalances => (
                "Get current account balances, assets, debt, and net worth.",
                schemars::schema_for!(PeriodParams).into(),
            ),
            Self::GetIncomeAndSpending => (
                "Get income, spending, net cashflow, and savings rate for a period.",
                schemars::schema_for!(PeriodParams).into(),
            ),
            Self::GetSpendingByCategory => (
                "Analyze spending broken down by categories with trends.",
                schemars::schema_for!(TopCategoriesParams).into(),
            ),
            Self::GetRecurringSubscriptions => (
                "Identify recurring charges and subscriptions.",
                schemars::schema_for!(RecurringParams).into(),
            ),
            Self::GetUnusualTransactions => (
                "Find unusually large or suspicious transactions.",
                schemars::schema_for!(LimitParams).into(),
            ),
            Self::CalculateSavingsGoalTimeline => (
                "Project timeline to reach a savings goal based on current savings rate.",
                schemars::schema_for!(SavingsGoalParams).into(),
            ),
        };
        ToolDefinition::new(self.as_str(), description, schema)
    }
}

/// The fixed tool surface offered to one agent variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSet {
    /// Autonomous report agent
    Report,
    /// Conversational advisor
    Advisor,
}

impl ToolSet {
    pub fn tools(&self) -> Vec<ToolName> {
        ToolName::all()
            .iter()
            .copied()
            .filter(|t| t.set() == *self)
            .collect()
    }

    /// Definitions advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools().iter().map(ToolName::definition).collect()
    }

    /// Resolve a model-supplied name within this set
    pub fn resolve(&self, name: &str) -> Option<ToolName> {
        ToolName::parse(name).filter(|t| t.set() == *self)
    }
}

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct PeriodParams {
    #[schemars(description = "Id of the user whose finances to analyze")]
    pub user_id: String,

    #[schemars(description = "Lookback window in days (e.g. 7, 30, 60, or 90)")]
    pub period_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct TopCategoriesParams {
    #[schemars(description = "Id of the user whose finances to analyze")]
    pub user_id: String,

    #[schemars(description = "Lookback window in days")]
    pub period_days: Option<u32>,

    #[schemars(description = "Number of top categories to return (default 10)")]
    pub top: Option<usize>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct RecurringParams {
    #[schemars(description = "Id of the user whose finances to analyze")]
    pub user_id: String,

    #[schemars(description = "Lookback window for recurring detection (default 90)")]
    pub window_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct LimitParams {
    #[schemars(description = "Id of the user whose finances to analyze")]
    pub user_id: String,

    #[schemars(description = "Lookback window in days")]
    pub period_days: Option<u32>,

    #[schemars(description = "Maximum number of transactions to return (default 5)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SavingsGoalParams {
    #[schemars(description = "Id of the user whose finances to analyze")]
    pub user_id: String,

    #[schemars(description = "Target savings amount in USD")]
    pub goal_amount: f64,

    #[schemars(description = "Window used to estimate monthly savings (default 60)")]
    pub period_days: Option<u32>,
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingTrends {
    pub top_categories: Vec<CategoryBreakdown>,
    pub total_spend: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExpenses {
    pub window_days: u32,
    pub recurring: Vec<RecurringCharge>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    pub top_transactions: Vec<TopTransaction>,
}

#[derive(Debug, Serialize)]
pub struct OpportunitySignals {
    pub signals: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalances {
    pub account_summary: AccountSummary,
    pub net_worth: f64,
    pub total_assets: f64,
    pub total_debt: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeAndSpending {
    pub period_days: u32,
    pub total_income: f64,
    pub total_spend: f64,
    pub net_cashflow: f64,
    pub savings_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpending {
    pub categories: Vec<CategoryBreakdown>,
    pub total_spend: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringSubscriptions {
    pub recurring: Vec<RecurringCharge>,
    /// Sum of average charge amounts
    pub total_monthly_recurring: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusualTransactions {
    pub anomalies: Vec<Anomaly>,
    pub largest_transactions: Vec<TopTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoalTimeline {
    pub goal_amount: f64,
    pub current_savings: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_needed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_savings: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// `None` when there is no feasible timeline
    pub months_to_goal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_to_goal: Option<f64>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Project how long reaching `goal_amount` takes at the snapshot's savings pace
///
/// Current savings are total assets; monthly savings scale the period's
/// net cashflow to 30 days.
pub fn savings_goal_timeline(goal_amount: f64, snapshot: &Snapshot) -> SavingsGoalTimeline {
    let current_savings = snapshot.account_summary.total_assets;
    let monthly_savings = snapshot.net_cashflow() * (30.0 / f64::from(snapshot.period_days));

    if goal_amount <= current_savings {
        return SavingsGoalTimeline {
            goal_amount,
            current_savings,
            amount_needed: None,
            monthly_savings: None,
            message: Some("Goal already achieved!".to_string()),
            months_to_goal: Some(0.0),
            years_to_goal: None,
        };
    }

    if monthly_savings <= 0.0 {
        return SavingsGoalTimeline {
            goal_amount,
            current_savings,
            amount_needed: None,
            monthly_savings: Some(monthly_savings),
            message: Some(
                "Currently not saving. Need to increase income or reduce expenses.".to_string(),
            ),
            months_to_goal: None,
            years_to_goal: None,
        };
    }

    let amount_needed = goal_amount - current_savings;
    let months = amount_needed / monthly_savings;
    SavingsGoalTimeline {
        goal_amount,
        current_savings,
        amount_needed: Some(amount_needed),
        monthly_savings: Some(monthly_savings),
        message: None,
        months_to_goal: Some(round1(months)),
        years_to_goal: Some(round1(months / 12.0)),
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Alternate spellings of `user_id` models sometimes send
const USER_ID_ALIASES: &[&str] = &["user", "userId"];

/// Move an aliased user id onto `user_id` when the canonical key is absent
pub fn normalize_user_id(arguments: &mut Map<String, Value>) {
    for alias in USER_ID_ALIASES {
        if let Some(value) = arguments.remove(*alias) {
            if !arguments.contains_key("user_id") {
                arguments.insert("user_id".to_string(), value);
            }
        }
    }
}

fn has_value(arguments: &Map<String, Value>, key: &str) -> bool {
    match arguments.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Runs named tools against snapshots from one pass's cache
pub struct ToolExecutor<'c, 'a> {
    cache: &'c SnapshotCache<'a>,
    set: ToolSet,
}

impl<'c, 'a> ToolExecutor<'c, 'a> {
    pub fn new(cache: &'c SnapshotCache<'a>, set: ToolSet) -> Self {
        Self { cache, set }
    }

    pub fn set(&self) -> ToolSet {
        self.set
    }

    /// Execute one tool call
    pub fn execute(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutput {
        let Some(tool) = self.set.resolve(name) else {
            return ToolOutput::Failure(format!("Unknown tool: {}", name));
        };

        let mut arguments = arguments.clone();
        normalize_user_id(&mut arguments);
        if !has_value(&arguments, "user_id") {
            return ToolOutput::Failure("user_id is required".to_string());
        }
        if tool == ToolName::CalculateSavingsGoalTimeline && !has_value(&arguments, "goal_amount") {
            return ToolOutput::Failure("goal_amount is required".to_string());
        }

        match self.run(tool, Value::Object(arguments)) {
            Ok(output) => output,
            Err(failure) => failure,
        }
    }

    fn run(&self, tool: ToolName, arguments: Value) -> std::result::Result<ToolOutput, ToolOutput> {
        let output = match tool {
            ToolName::GetAccountOverview => {
                let p: PeriodParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&snapshot.account_summary)
            }
            ToolName::GetCashflowSummary => {
                let p: PeriodParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&snapshot.cashflow)
            }
            ToolName::GetSpendingTrends => {
                let p: TopCategoriesParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&SpendingTrends {
                    top_categories: first_n(&snapshot.category_breakdown, p.top, DEFAULT_TOP_CATEGORIES),
                    total_spend: snapshot.total_spend(),
                })
            }
            ToolName::GetRecurringExpenses => {
                let p: RecurringParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, None)?;
                ToolOutput::from_result(&RecurringExpenses {
                    window_days: p.window_days.filter(|d| *d > 0).unwrap_or(DEFAULT_WINDOW_DAYS),
                    recurring: snapshot.recurring_charges.clone(),
                })
            }
            ToolName::GetAnomalyTransactions => {
                let p: LimitParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&AnomalyReport {
                    anomalies: first_n(&snapshot.anomalies, p.limit, DEFAULT_LIMIT),
                    top_transactions: first_n(&snapshot.top_transactions, p.limit, DEFAULT_LIMIT),
                })
            }
            ToolName::GetOpportunitySignals => {
                let p: PeriodParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&OpportunitySignals {
                    signals: snapshot.opportunity_signals.clone(),
                })
            }
            ToolName::GetAccountBalances => {
                let p: PeriodParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                let summary = &snapshot.account_summary;
                ToolOutput::from_result(&AccountBalances {
                    account_summary: summary.clone(),
                    net_worth: summary.net_worth,
                    total_assets: summary.total_assets,
                    total_debt: summary.total_debt,
                })
            }
            ToolName::GetIncomeAndSpending => {
                let p: PeriodParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                let cashflow = snapshot.cashflow.current;
                ToolOutput::from_result(&IncomeAndSpending {
                    period_days: snapshot.period_days,
                    total_income: cashflow.total_income,
                    total_spend: cashflow.total_spend,
                    net_cashflow: cashflow.net_cashflow,
                    savings_rate: cashflow.savings_rate,
                })
            }
            ToolName::GetSpendingByCategory => {
                let p: TopCategoriesParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&CategorySpending {
                    categories: first_n(&snapshot.category_breakdown, p.top, DEFAULT_TOP_CATEGORIES),
                    total_spend: snapshot.total_spend(),
                })
            }
            ToolName::GetRecurringSubscriptions => {
                let p: RecurringParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, None)?;
                ToolOutput::from_result(&RecurringSubscriptions {
                    recurring: snapshot.recurring_charges.clone(),
                    total_monthly_recurring: snapshot
                        .recurring_charges
                        .iter()
                        .map(|r| r.average_amount)
                        .sum(),
                })
            }
            ToolName::GetUnusualTransactions => {
                let p: LimitParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&UnusualTransactions {
                    anomalies: first_n(&snapshot.anomalies, p.limit, DEFAULT_LIMIT),
                    largest_transactions: first_n(&snapshot.top_transactions, p.limit, DEFAULT_LIMIT),
                })
            }
            ToolName::CalculateSavingsGoalTimeline => {
                let p: SavingsGoalParams = self.params(tool, arguments)?;
                let snapshot = self.snapshot(&p.user_id, p.period_days)?;
                ToolOutput::from_result(&savings_goal_timeline(p.goal_amount, &snapshot))
            }
        };
        Ok(output)
    }

    fn params<P: DeserializeOwned>(
        &self,
        tool: ToolName,
        arguments: Value,
    ) -> std::result::Result<P, ToolOutput> {
        serde_json::from_value(arguments).map_err(|e| {
            ToolOutput::Failure(format!("Invalid arguments for {}: {}", tool.as_str(), e))
        })
    }

    fn snapshot(
        &self,
        user_id: &str,
        period_days: Option<u32>,
    ) -> std::result::Result<std::sync::Arc<Snapshot>, ToolOutput> {
        let period_days = period_days.filter(|d| *d > 0).unwrap_or(DEFAULT_PERIOD_DAYS);
        self.cache.get(user_id, period_days).map_err(|e| {
            tracing::error!(user_id, period_days, error = %e, "Failed to build snapshot for tool");
            ToolOutput::Failure(format!("Failed to retrieve financial data: {}", e))
        })
    }
}

/// First `n` items, where a missing or zero `n` means `default`
fn first_n<T: Clone>(items: &[T], n: Option<usize>, default: usize) -> Vec<T> {
    let n = n.filter(|n| *n > 0).unwrap_or(default);
    items.iter().take(n).cloned().collect()
}

// =============================================================================
// Sessions
// =============================================================================

/// How a session's user id is applied to model-supplied arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdPolicy {
    /// Use the session's id only when the model sent none
    FillMissing,
    /// Always replace whatever the model sent
    Override,
}

/// Binds an executor to one user for the duration of an agent run
pub struct ToolSession<'e, 'c, 'a> {
    executor: &'e ToolExecutor<'c, 'a>,
    user_id: String,
    period_days: Option<u32>,
    policy: UserIdPolicy,
}

impl<'e, 'c, 'a> ToolSession<'e, 'c, 'a> {
    pub fn new(executor: &'e ToolExecutor<'c, 'a>, user_id: &str, policy: UserIdPolicy) -> Self {
        Self {
            executor,
            user_id: user_id.to_string(),
            period_days: None,
            policy,
        }
    }

    /// Fill `period_days` on calls that omit it
    pub fn with_period_days(mut self, period_days: u32) -> Self {
        self.period_days = Some(period_days);
        self
    }

    /// Arguments after session defaults are applied
    pub fn prepare(&self, mut arguments: Map<String, Value>) -> Map<String, Value> {
        normalize_user_id(&mut arguments);
        match self.policy {
            UserIdPolicy::Override => {
                arguments.insert("user_id".into(), Value::String(self.user_id.clone()));
            }
            UserIdPolicy::FillMissing => {
                if !has_value(&arguments, "user_id") {
                    arguments.insert("user_id".into(), Value::String(self.user_id.clone()));
                }
            }
        }
        if let Some(period_days) = self.period_days {
            let missing = !matches!(arguments.get("period_days"), Some(v) if v.as_u64().unwrap_or(0) > 0);
            if missing {
                arguments.insert("period_days".into(), json!(period_days));
            }
        }
        arguments
    }
}

impl ToolDispatcher for ToolSession<'_, '_, '_> {
    fn dispatch(&self, name: &str, arguments: Map<String, Value>) -> ToolOutput {
        self.executor.execute(name, &self.prepare(arguments))
    }
}
