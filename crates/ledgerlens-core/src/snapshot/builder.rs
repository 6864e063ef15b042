//! Snapshot aggregation
//!
//! Turns raw transactions and account balances into a [`Snapshot`]. Every
//! computation here is pure; the only I/O is the repository reads in
//! [`SnapshotBuilder::build`].

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use super::types::*;
use crate::error::Result;
use crate::models::{AccountClass, DateRange, InstitutionAccounts, Transaction};
use crate::repository::Repository;

/// Maximum category entries kept in a snapshot
pub const MAX_CATEGORIES: usize = 15;
/// Maximum recurring charges kept in a snapshot
pub const MAX_RECURRING: usize = 15;
/// Maximum anomalies kept in a snapshot
pub const MAX_ANOMALIES: usize = 10;
/// Number of largest spend transactions kept
pub const TOP_TRANSACTIONS: usize = 5;
/// Number of newest transactions in `transactions.recent`
pub const RECENT_TRANSACTIONS: usize = 20;
/// Recurring-charge detection always looks back this many days
pub const RECURRING_WINDOW_DAYS: i64 = 90;

/// Standard deviations above the mean before a charge counts as an anomaly
const ANOMALY_SIGMA: f64 = 2.0;

/// The three windows derived from a period length and an anchor day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    /// Last N days ending on the anchor
    pub current: DateRange,
    /// The N days immediately before `current`
    pub baseline: DateRange,
    /// Fixed 90-day lookback for recurring charges
    pub recurring: DateRange,
}

impl Periods {
    pub fn new(today: NaiveDate, period_days: u32) -> Self {
        let current = DateRange::ending_on(today, period_days);
        Self {
            current,
            baseline: current.preceding(),
            recurring: DateRange::new(today - Duration::days(RECURRING_WINDOW_DAYS), today),
        }
    }
}

/// Builds snapshots against a repository with a fixed "today"
pub struct SnapshotBuilder<'a> {
    repo: &'a dyn Repository,
    today: NaiveDate,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(repo: &'a dyn Repository, today: NaiveDate) -> Self {
        Self { repo, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Build the snapshot for one user and period
    ///
    /// A period of 0 days is treated as 1. A user with no transactions or
    /// accounts gets a zero-valued snapshot rather than an error.
    pub fn build(&self, user_id: &str, period_days: u32) -> Result<Snapshot> {
        let period_days = period_days.max(1);
        let periods = Periods::new(self.today, period_days);

        let current = self.repo.find_transactions(user_id, periods.current)?;
        let baseline = self.repo.find_transactions(user_id, periods.baseline)?;
        let recurring_window = self.repo.find_transactions(user_id, periods.recurring)?;
        let institutions = self.repo.find_accounts(user_id)?;

        debug!(
            user_id,
            period_days,
            current = current.len(),
            baseline = baseline.len(),
            recurring_window = recurring_window.len(),
            "Loaded snapshot inputs"
        );

        Ok(assemble(
            user_id,
            period_days,
            periods,
            &current,
            &baseline,
            &recurring_window,
            &institutions,
        ))
    }
}

/// Assemble a snapshot from already-loaded records
pub fn assemble(
    user_id: &str,
    period_days: u32,
    periods: Periods,
    current: &[Transaction],
    baseline: &[Transaction],
    recurring_window: &[Transaction],
    institutions: &[InstitutionAccounts],
) -> Snapshot {
    let account_summary = account_summary(institutions);
    let cashflow = CashflowComparison {
        current: cashflow(current),
        baseline: cashflow(baseline),
    };
    let category_breakdown = category_breakdown(current, baseline);
    let recurring_charges = recurring_charges(recurring_window);
    let anomalies = anomalies(current);
    let top_transactions = top_transactions(current, TOP_TRANSACTIONS);
    let opportunity_signals = opportunity_signals(
        &account_summary,
        &cashflow.current,
        &category_breakdown,
        &recurring_charges,
        &anomalies,
    );

    let current_simplified = simplify(current);
    let recent = current_simplified
        .iter()
        .take(RECENT_TRANSACTIONS)
        .cloned()
        .collect();

    Snapshot {
        user_id: user_id.to_string(),
        period_days,
        date_range: periods.current,
        transactions: SnapshotTransactions {
            current: current_simplified,
            baseline: simplify(baseline),
            recent,
        },
        account_summary,
        cashflow,
        category_breakdown,
        recurring_charges,
        anomalies,
        top_transactions,
        opportunity_signals,
    }
}

/// Totals across all institutions. Unrecognized account types count toward neither side.
pub fn account_summary(institutions: &[InstitutionAccounts]) -> AccountSummary {
    let mut summary = AccountSummary::default();

    for institution in institutions {
        let mut asset_total = 0.0;
        let mut debt_total = 0.0;

        for account in &institution.accounts {
            match account.account_type.class() {
                AccountClass::Asset => asset_total += account.current_balance,
                AccountClass::Debt => debt_total += account.current_balance,
                AccountClass::Ignored => {}
            }
            summary.accounts.push(AccountBalance {
                institution_id: institution.institution_id.clone(),
                institution_name: institution.institution_name.clone(),
                account_id: account.account_id.clone(),
                name: account.name.clone(),
                account_type: account.account_type.as_str().to_string(),
                subtype: account.subtype.clone(),
                balance: account.current_balance,
            });
        }

        summary.total_assets += asset_total;
        summary.total_debt += debt_total;
        summary.institutions.push(InstitutionSummary {
            institution_id: institution.institution_id.clone(),
            institution_name: institution.institution_name.clone(),
            account_count: institution.accounts.len(),
            asset_total,
            debt_total,
            last_sync: institution.last_sync,
        });
    }

    summary.net_worth = summary.total_assets - summary.total_debt;
    summary
}

pub fn cashflow(transactions: &[Transaction]) -> Cashflow {
    let mut total_spend = 0.0;
    let mut total_income = 0.0;

    for tx in transactions {
        if tx.amount >= 0.0 {
            total_spend += tx.amount;
        } else {
            total_income += tx.amount.abs();
        }
    }

    let net_cashflow = total_income - total_spend;
    let savings_rate = if total_income > 0.0 {
        net_cashflow / total_income * 100.0
    } else {
        0.0
    };

    Cashflow {
        total_income,
        total_spend,
        net_cashflow,
        savings_rate,
    }
}

#[derive(Default)]
struct CategoryTotals {
    total: f64,
    count: usize,
}

fn spend_by_category(transactions: &[Transaction]) -> BTreeMap<String, CategoryTotals> {
    let mut totals: BTreeMap<String, CategoryTotals> = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.is_spend()) {
        let entry = totals.entry(tx.primary_category().to_string()).or_default();
        entry.total += tx.amount;
        entry.count += 1;
    }
    totals
}

/// Per-category spend with deltas against the baseline period
///
/// Categories seen only in the baseline are kept with a zero current total
/// and a -100% change.
pub fn category_breakdown(current: &[Transaction], baseline: &[Transaction]) -> Vec<CategoryBreakdown> {
    let current_totals = spend_by_category(current);
    let baseline_totals = spend_by_category(baseline);

    let mut breakdown: Vec<CategoryBreakdown> = current_totals
        .iter()
        .map(|(category, totals)| {
            let baseline_total = baseline_totals.get(category).map_or(0.0, |b| b.total);
            let change = totals.total - baseline_total;
            CategoryBreakdown {
                category: category.clone(),
                total: totals.total,
                count: totals.count,
                average: if totals.count > 0 {
                    totals.total / totals.count as f64
                } else {
                    0.0
                },
                baseline_total,
                change,
                change_pct: (baseline_total > 0.0).then(|| change / baseline_total * 100.0),
            }
        })
        .collect();

    for (category, totals) in &baseline_totals {
        if current_totals.contains_key(category) {
            continue;
        }
        breakdown.push(CategoryBreakdown {
            category: category.clone(),
            total: 0.0,
            count: 0,
            average: 0.0,
            baseline_total: totals.total,
            change: -totals.total,
            change_pct: Some(-100.0),
        });
    }

    breakdown.sort_by(|a, b| b.total.total_cmp(&a.total));
    breakdown.truncate(MAX_CATEGORIES);
    breakdown
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Merchants charged at least twice in the window
pub fn recurring_charges(transactions: &[Transaction]) -> Vec<RecurringCharge> {
    let mut by_merchant: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.is_spend()) {
        if let Some(merchant) = tx.merchant_label() {
            by_merchant.entry(merchant).or_default().push(tx.amount);
        }
    }

    let mut recurring: Vec<RecurringCharge> = by_merchant
        .into_iter()
        .filter(|(_, amounts)| amounts.len() >= 2)
        .map(|(merchant, amounts)| {
            let average_amount = mean(&amounts);
            let std = std_dev(&amounts, average_amount);
            RecurringCharge {
                merchant: merchant.to_string(),
                average_amount,
                transactions: amounts.len(),
                total_spent: amounts.iter().sum(),
                is_consistent: std <= f64::max(1.0, average_amount * 0.1),
            }
        })
        .collect();

    recurring.sort_by(|a, b| b.total_spent.total_cmp(&a.total_spent));
    recurring.truncate(MAX_RECURRING);
    recurring
}

/// Threshold above which a spend counts as unusual, or `None` with no spend
pub fn anomaly_threshold(transactions: &[Transaction]) -> Option<f64> {
    let expenses: Vec<f64> = transactions
        .iter()
        .filter(|t| t.is_spend())
        .map(|t| t.amount)
        .collect();
    if expenses.is_empty() {
        return None;
    }

    let mean = mean(&expenses);
    let std = std_dev(&expenses, mean);
    Some(if std == 0.0 {
        mean * 2.0
    } else {
        mean + ANOMALY_SIGMA * std
    })
}

pub fn anomalies(transactions: &[Transaction]) -> Vec<Anomaly> {
    let Some(threshold) = anomaly_threshold(transactions) else {
        return Vec::new();
    };

    let mut anomalies: Vec<Anomaly> = transactions
        .iter()
        .filter(|t| t.amount > threshold)
        .map(|t| Anomaly {
            date: t.date,
            amount: t.amount,
            name: t.name.clone(),
            merchant: t.merchant_name.clone(),
            category: t.primary_category().to_string(),
            threshold,
        })
        .collect();

    anomalies.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    anomalies.truncate(MAX_ANOMALIES);
    anomalies
}

/// Largest spend transactions, no threshold applied
pub fn top_transactions(transactions: &[Transaction], limit: usize) -> Vec<TopTransaction> {
    let mut expenses: Vec<&Transaction> = transactions.iter().filter(|t| t.is_spend()).collect();
    expenses.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    expenses
        .into_iter()
        .take(limit)
        .map(|t| TopTransaction {
            date: t.date,
            amount: t.amount,
            name: t.name.clone(),
            merchant: t.merchant_name.clone(),
            category: t.primary_category().to_string(),
        })
        .collect()
}

/// Fixed threshold rules, evaluated in order, each adding at most one line
pub fn opportunity_signals(
    accounts: &AccountSummary,
    cashflow: &Cashflow,
    categories: &[CategoryBreakdown],
    recurring: &[RecurringCharge],
    anomalies: &[Anomaly],
) -> Vec<String> {
    let mut signals = Vec::new();

    if cashflow.net_cashflow < 0.0 {
        signals.push(
            "Net cashflow is negative; spending exceeds income in the current period.".to_string(),
        );
    } else if cashflow.savings_rate < 10.0 {
        signals.push(
            "Savings rate is below 10%; consider trimming discretionary spend to boost savings."
                .to_string(),
        );
    }

    if accounts.total_debt > 0.0 && accounts.total_assets > 0.0 {
        let debt_ratio = accounts.total_debt / accounts.total_assets.max(1.0);
        if debt_ratio > 0.6 {
            signals.push("Debt represents more than 60% of assets; monitor leverage closely.".to_string());
        }
    }

    if let Some(top) = recurring.first() {
        if top.total_spent > 300.0 {
            signals.push(format!(
                "High recurring spend detected with {} at {:.2} over three months.",
                top.merchant, top.total_spent
            ));
        }
    }

    if let Some(largest) = anomalies.first() {
        signals.push(format!(
            "Unusually large transaction of {:.2} on {} ({}).",
            largest.amount, largest.date, largest.name
        ));
    }

    if let Some(top) = categories.first() {
        let share = if cashflow.total_spend > 0.0 {
            top.total / cashflow.total_spend * 100.0
        } else {
            0.0
        };
        if share > 35.0 {
            signals.push(format!(
                "{} accounts for {:.1}% of spending; explore optimization opportunities.",
                top.category, share
            ));
        }
    }

    signals
}

/// Newest first; ties keep their original order
fn simplify(transactions: &[Transaction]) -> Vec<SimplifiedTransaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted.into_iter().map(SimplifiedTransaction::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;
    use crate::test_utils::{account, institution, spend, InMemoryRepository};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn days_ago(n: i64) -> NaiveDate {
        today() - Duration::days(n)
    }

    fn amounts(values: &[f64]) -> Vec<Transaction> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| spend(&format!("t{i}"), *v, days_ago(1), &["Shopping"]))
            .collect()
    }

    #[test]
    fn test_periods() {
        let periods = Periods::new(today(), 30);
        assert_eq!(periods.current.start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(periods.current.end, today());
        assert_eq!(periods.baseline.end, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        assert_eq!(periods.baseline.start, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(periods.recurring.start, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_cashflow_invariants() {
        let mut txs = amounts(&[100.0, 50.25, 0.0]);
        txs.push(spend("inc", -400.0, days_ago(2), &[]));

        let cf = cashflow(&txs);
        assert_eq!(cf.total_spend, 150.25);
        assert_eq!(cf.total_income, 400.0);
        assert_eq!(cf.net_cashflow, cf.total_income - cf.total_spend);
        assert!((cf.savings_rate - 62.4375).abs() < 1e-9);
    }

    #[test]
    fn test_cashflow_without_income_has_zero_savings_rate() {
        let cf = cashflow(&amounts(&[20.0, 30.0]));
        assert_eq!(cf.total_income, 0.0);
        assert_eq!(cf.net_cashflow, -50.0);
        assert_eq!(cf.savings_rate, 0.0);

        let empty = cashflow(&[]);
        assert_eq!(empty, Cashflow::default());
    }

    #[test]
    fn test_account_summary_ignores_unknown_types() {
        let institutions = vec![
            institution(
                "ins_1",
                vec![
                    account("chk", AccountType::Depository, 5000.0),
                    account("brk", AccountType::Brokerage, 2500.0),
                    account("cc", AccountType::Credit, 1200.0),
                ],
            ),
            institution(
                "ins_2",
                vec![
                    account("mtg", AccountType::Mortgage, 800.0),
                    account("odd", AccountType::Other("payroll".into()), 99999.0),
                ],
            ),
        ];

        let summary = account_summary(&institutions);
        assert_eq!(summary.total_assets, 7500.0);
        assert_eq!(summary.total_debt, 2000.0);
        assert_eq!(summary.net_worth, summary.total_assets - summary.total_debt);
        assert_eq!(summary.institutions.len(), 2);
        assert_eq!(summary.institutions[0].account_count, 3);
        assert_eq!(summary.institutions[1].debt_total, 800.0);
        assert_eq!(summary.accounts.len(), 5);
    }

    #[test]
    fn test_category_breakdown_sorted_and_capped() {
        let current: Vec<Transaction> = (0..20)
            .map(|i| spend(&format!("c{i}"), 10.0 + i as f64, days_ago(1), &[&format!("Cat{i}")]))
            .collect();

        let breakdown = category_breakdown(&current, &[]);
        assert_eq!(breakdown.len(), MAX_CATEGORIES);
        assert!(breakdown.windows(2).all(|w| w[0].total >= w[1].total));
        assert_eq!(breakdown[0].category, "Cat19");
        assert!(breakdown.iter().all(|c| c.change_pct.is_none()));
    }

    #[test]
    fn test_category_only_in_baseline() {
        let current = vec![spend("a", 80.0, days_ago(1), &["Food"])];
        let baseline = vec![
            spend("b", 40.0, days_ago(40), &["Food"]),
            spend("c", 60.0, days_ago(41), &["Travel"]),
            spend("d", -500.0, days_ago(42), &["Travel"]),
        ];

        let breakdown = category_breakdown(&current, &baseline);
        assert_eq!(breakdown.len(), 2);

        let food = &breakdown[0];
        assert_eq!(food.category, "Food");
        assert_eq!(food.change, 40.0);
        assert_eq!(food.change_pct, Some(100.0));

        let travel = &breakdown[1];
        assert_eq!(travel.total, 0.0);
        assert_eq!(travel.baseline_total, 60.0);
        assert_eq!(travel.change, -60.0);
        assert_eq!(travel.change_pct, Some(-100.0));
    }

    #[test]
    fn test_uncategorized_spend() {
        let breakdown = category_breakdown(&[spend("a", 5.0, days_ago(1), &[])], &[]);
        assert_eq!(breakdown[0].category, "Uncategorized");
    }

    #[test]
    fn test_recurring_consistency_flag() {
        let mut txs = Vec::new();
        for (i, amount) in [10.00, 10.00, 10.05].iter().enumerate() {
            let mut t = spend(&format!("s{i}"), *amount, days_ago(30 * i as i64), &["Subscription"]);
            t.merchant_name = Some("StreamCo".into());
            txs.push(t);
        }

        let recurring = recurring_charges(&txs);
        assert_eq!(recurring.len(), 1);
        let charge = &recurring[0];
        assert_eq!(charge.merchant, "StreamCo");
        assert_eq!(charge.transactions, 3);
        assert!((charge.average_amount - 10.0167).abs() < 1e-3);
        assert!(charge.is_consistent);
    }

    #[test]
    fn test_recurring_requires_two_charges_and_groups_by_name_fallback() {
        let txs = vec![
            spend("a", 50.0, days_ago(1), &[]),
            spend("b", 150.0, days_ago(31), &[]),
            {
                let mut t = spend("c", 9.0, days_ago(3), &[]);
                t.merchant_name = Some("One Off".into());
                t
            },
        ];

        let recurring = recurring_charges(&txs);
        assert_eq!(recurring.len(), 1);
        // Both fixture rows share the default name
        assert_eq!(recurring[0].total_spent, 200.0);
        assert!(!recurring[0].is_consistent);
    }

    #[test]
    fn test_anomaly_threshold_arithmetic() {
        let txs = amounts(&[50.0, 55.0, 60.0, 500.0]);
        let mean = 166.25;
        let variance = [50.0f64, 55.0, 60.0, 500.0]
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / 4.0;
        let expected = mean + 2.0 * variance.sqrt();

        let threshold = anomaly_threshold(&txs).unwrap();
        assert!((threshold - expected).abs() < 1e-9);
        assert!(threshold > 500.0);
        assert!(anomalies(&txs).is_empty());
    }

    #[test]
    fn test_anomaly_flagged_and_zero_variance_rule() {
        let mut values = vec![20.0; 12];
        values.push(400.0);
        let found = anomalies(&amounts(&values));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, 400.0);
        assert_eq!(found[0].category, "Shopping");

        // Zero variance: threshold is twice the mean, so nothing exceeds it
        let flat = amounts(&[25.0, 25.0, 25.0]);
        assert_eq!(anomaly_threshold(&flat), Some(50.0));
        assert!(anomalies(&flat).is_empty());
        assert_eq!(anomaly_threshold(&[]), None);
    }

    #[test]
    fn test_top_transactions() {
        let mut txs = amounts(&[5.0, 90.0, 15.0, 70.0, 30.0, 60.0]);
        txs.push(spend("inc", -1000.0, days_ago(1), &[]));
        let top = top_transactions(&txs, TOP_TRANSACTIONS);
        let picked: Vec<f64> = top.iter().map(|t| t.amount).collect();
        assert_eq!(picked, vec![90.0, 70.0, 60.0, 30.0, 15.0]);
    }

    #[test]
    fn test_opportunity_signals_order() {
        let accounts = AccountSummary {
            total_assets: 1000.0,
            total_debt: 900.0,
            net_worth: 100.0,
            ..Default::default()
        };
        let cf = Cashflow {
            total_income: 1000.0,
            total_spend: 1200.0,
            net_cashflow: -200.0,
            savings_rate: -20.0,
        };
        let categories = vec![CategoryBreakdown {
            category: "Rent".into(),
            total: 600.0,
            count: 1,
            average: 600.0,
            baseline_total: 0.0,
            change: 600.0,
            change_pct: None,
        }];
        let recurring = vec![RecurringCharge {
            merchant: "Gym".into(),
            average_amount: 120.0,
            transactions: 3,
            total_spent: 360.0,
            is_consistent: true,
        }];
        let anomalies = vec![Anomaly {
            date: days_ago(2),
            amount: 999.5,
            name: "TV STORE".into(),
            merchant: None,
            category: "Shopping".into(),
            threshold: 500.0,
        }];

        let signals = opportunity_signals(&accounts, &cf, &categories, &recurring, &anomalies);
        assert_eq!(
            signals,
            vec![
                "Net cashflow is negative; spending exceeds income in the current period.",
                "Debt represents more than 60% of assets; monitor leverage closely.",
                "High recurring spend detected with Gym at 360.00 over three months.",
                "Unusually large transaction of 999.50 on 2024-06-28 (TV STORE).",
                "Rent accounts for 50.0% of spending; explore optimization opportunities.",
            ]
        );
    }

    #[test]
    fn test_low_savings_rate_signal() {
        let cf = Cashflow {
            total_income: 1000.0,
            total_spend: 950.0,
            net_cashflow: 50.0,
            savings_rate: 5.0,
        };
        let signals = opportunity_signals(&AccountSummary::default(), &cf, &[], &[], &[]);
        assert_eq!(signals.len(), 1);
        assert!(signals[0].starts_with("Savings rate is below 10%"));
    }

    #[test]
    fn test_build_end_to_end() {
        let repo = InMemoryRepository::new();
        repo.add_transaction("u1", spend("rent", 1200.0, days_ago(5), &["Rent"]));
        repo.add_transaction("u1", spend("pay", -3000.0, days_ago(3), &[]));
        // Outside the 30-day window
        repo.add_transaction("u1", spend("old", 75.0, days_ago(45), &["Food"]));
        repo.add_institution(
            "u1",
            institution("ins_1", vec![account("chk", AccountType::Depository, 4200.0)]),
        );

        let snapshot = SnapshotBuilder::new(&repo, today()).build("u1", 30).unwrap();

        assert_eq!(snapshot.total_spend(), 1200.0);
        assert_eq!(snapshot.total_income(), 3000.0);
        assert_eq!(snapshot.net_cashflow(), 1800.0);
        assert!((snapshot.cashflow.current.savings_rate - 60.0).abs() < 1e-9);
        assert_eq!(snapshot.transaction_count(), 2);

        let rent = &snapshot.category_breakdown[0];
        assert_eq!(rent.category, "Rent");
        assert_eq!(rent.total, 1200.0);
        // Baseline-only Food follows Rent
        assert_eq!(snapshot.category_breakdown[1].category, "Food");
        assert_eq!(snapshot.category_breakdown[1].change_pct, Some(-100.0));

        assert_eq!(snapshot.transactions.current[0].transaction_id, "pay");
        assert_eq!(snapshot.transactions.recent.len(), 2);
        assert_eq!(snapshot.account_summary.net_worth, 4200.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let repo = InMemoryRepository::new();
        for i in 0..30 {
            let mut t = spend(&format!("t{i}"), 10.0 + (i % 7) as f64, days_ago(i), &["Food"]);
            t.merchant_name = Some(format!("M{}", i % 4));
            repo.add_transaction("u1", t);
        }

        let builder = SnapshotBuilder::new(&repo, today());
        let first = builder.build("u1", 14).unwrap();
        let second = builder.build("u1", 14).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_build_with_no_data() {
        let repo = InMemoryRepository::new();
        let snapshot = SnapshotBuilder::new(&repo, today()).build("nobody", 0).unwrap();
        assert_eq!(snapshot.period_days, 1);
        assert_eq!(snapshot.transaction_count(), 0);
        assert_eq!(snapshot.cashflow.current, Cashflow::default());
        assert!(snapshot.category_breakdown.is_empty());
        // Zero income and zero spend still trips the savings-rate rule
        assert_eq!(snapshot.opportunity_signals.len(), 1);
    }
}
