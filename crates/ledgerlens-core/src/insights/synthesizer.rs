//! Response synthesizer
//!
//! Turns a snapshot (and, when available, the model's structured output)
//! into an [`InsightDocument`]. Baseline metrics are always computed here
//! from the snapshot, independent of the model.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::types::{
    InsightContext, InsightDocument, InsightSummary, KeyMetric, ModelMetric, Recommendation,
    StructuredInsight, DOCUMENT_VERSION,
};
use crate::snapshot::Snapshot;

pub const MAX_METRICS: usize = 10;
pub const MAX_RECOMMENDATIONS: usize = 6;
pub const MAX_HIGHLIGHTS: usize = 6;
pub const MAX_ALERTS: usize = 6;
/// Opportunity signals promoted to highlights on the heuristic path
pub const HEURISTIC_HIGHLIGHTS: usize = 3;

const PLACEHOLDER_HEADLINE: &str = "Connect accounts to unlock insights";
const PLACEHOLDER_NARRATIVE: &str = "No financial data available for analysis. Connect your accounts to get personalized AI insights and recommendations.";
const HEURISTIC_HEADLINE: &str = "Fresh insights based on recent activity";
const DEFAULT_HEADLINE: &str = "Financial insight update";
const DEFAULT_RECOMMENDATION_TITLE: &str = "Recommendation";

/// Format whole US dollars with thousands separators: `$1,234`, `-$56`
pub fn format_currency(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Seven deterministic metrics every document starts from
pub fn baseline_metrics(snapshot: &Snapshot) -> Vec<KeyMetric> {
    let summary = &snapshot.account_summary;
    let cashflow = &snapshot.cashflow.current;
    let currency = |label: String, value: f64| KeyMetric {
        label,
        value: Some(value),
        display_value: Some(format_currency(value)),
    };

    vec![
        currency("Net worth".into(), summary.net_worth),
        currency("Total assets".into(), summary.total_assets),
        currency("Total debt".into(), summary.total_debt),
        currency(format!("{}d income", snapshot.period_days), cashflow.total_income),
        currency(format!("{}d spend", snapshot.period_days), cashflow.total_spend),
        currency("Net cashflow".into(), cashflow.net_cashflow),
        KeyMetric {
            label: "Savings rate".into(),
            value: Some(cashflow.savings_rate),
            display_value: Some(format!("{:.1}%", cashflow.savings_rate)),
        },
    ]
}

/// Numeric value of a model metric
///
/// Numbers pass through; strings are parsed after dropping currency
/// symbols, separators and a trailing percent sign. Anything else is `None`.
pub fn coerce_metric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Append model metrics whose labels are new, then cap the list
///
/// Labels compare case-insensitively against the baseline and against
/// model metrics already accepted.
pub fn merge_metrics(baseline: Vec<KeyMetric>, model: &[ModelMetric]) -> Vec<KeyMetric> {
    let mut seen: std::collections::HashSet<String> =
        baseline.iter().map(|m| m.label.to_lowercase()).collect();
    let mut merged = baseline;

    for metric in model {
        let Some(label) = non_blank(metric.label.as_deref()) else {
            continue;
        };
        if !seen.insert(label.to_lowercase()) {
            continue;
        }

        let value = coerce_metric_value(&metric.value);
        let display_value = non_blank(metric.display.as_deref())
            .or_else(|| non_blank(metric.display_value.as_deref()))
            .or_else(|| value.map(format_currency));

        merged.push(KeyMetric {
            label,
            value,
            display_value,
        });
    }

    merged.truncate(MAX_METRICS);
    merged
}

/// Document context drawn from the snapshot
pub fn context(snapshot: &Snapshot, generated_from: &str) -> InsightContext {
    InsightContext {
        period_days: snapshot.period_days,
        date_range: snapshot.date_range,
        transaction_count: snapshot.transaction_count(),
        total_income: snapshot.total_income(),
        total_spend: snapshot.total_spend(),
        net_cashflow: snapshot.net_cashflow(),
        generated_from: generated_from.to_string(),
    }
}

/// "Connect accounts" document for a period with no transactions
pub fn placeholder_document(
    snapshot: &Snapshot,
    generated_from: &str,
    generated_at: DateTime<Utc>,
) -> InsightDocument {
    InsightDocument {
        summary: InsightSummary {
            headline: PLACEHOLDER_HEADLINE.to_string(),
            narrative: PLACEHOLDER_NARRATIVE.to_string(),
        },
        key_metrics: Vec::new(),
        highlights: Vec::new(),
        recommendations: Vec::new(),
        alerts: Vec::new(),
        context: InsightContext {
            transaction_count: 0,
            total_income: 0.0,
            total_spend: 0.0,
            net_cashflow: 0.0,
            ..context(snapshot, generated_from)
        },
        generated_at,
        version: DOCUMENT_VERSION,
    }
}

/// Baseline metrics with a templated narrative
pub fn heuristic_document(
    snapshot: &Snapshot,
    generated_from: &str,
    generated_at: DateTime<Utc>,
) -> InsightDocument {
    let net = snapshot.net_cashflow();
    let trend = if net >= 0.0 { "positive" } else { "negative" };
    let summary = &snapshot.account_summary;
    let narrative = format!(
        "LedgerLens analyzed the last {} days. Net cashflow is {} at {}. \
         Total assets stand at {} vs. debt of {}.",
        snapshot.period_days,
        trend,
        format_currency(net.abs()),
        format_currency(summary.total_assets),
        format_currency(summary.total_debt),
    );

    InsightDocument {
        summary: InsightSummary {
            headline: HEURISTIC_HEADLINE.to_string(),
            narrative,
        },
        key_metrics: baseline_metrics(snapshot),
        highlights: snapshot
            .opportunity_signals
            .iter()
            .take(HEURISTIC_HIGHLIGHTS)
            .cloned()
            .collect(),
        recommendations: Vec::new(),
        alerts: Vec::new(),
        context: context(snapshot, generated_from),
        generated_at,
        version: DOCUMENT_VERSION,
    }
}

/// Model output merged over baseline metrics, with defaults and caps
pub fn structured_document(
    snapshot: &Snapshot,
    insight: &StructuredInsight,
    generated_from: &str,
    generated_at: DateTime<Utc>,
) -> InsightDocument {
    let summary = insight.summary.clone().unwrap_or_default();
    let recommendations = insight
        .recommendations
        .as_deref()
        .unwrap_or_default()
        .iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|r| Recommendation {
            title: non_blank(r.title.as_deref())
                .unwrap_or_else(|| DEFAULT_RECOMMENDATION_TITLE.to_string()),
            detail: r.detail.clone().unwrap_or_default(),
            impact: non_blank(r.impact.as_deref()),
            action: non_blank(r.action.as_deref()),
            category: non_blank(r.category.as_deref()),
        })
        .collect();

    InsightDocument {
        summary: InsightSummary {
            headline: non_blank(summary.headline.as_deref())
                .unwrap_or_else(|| DEFAULT_HEADLINE.to_string()),
            narrative: summary.narrative.unwrap_or_default(),
        },
        key_metrics: merge_metrics(
            baseline_metrics(snapshot),
            insight.key_metrics.as_deref().unwrap_or_default(),
        ),
        highlights: capped(insight.highlights.as_deref(), MAX_HIGHLIGHTS),
        recommendations,
        alerts: capped(insight.alerts.as_deref(), MAX_ALERTS),
        context: context(snapshot, generated_from),
        generated_at,
        version: DOCUMENT_VERSION,
    }
}

fn capped(items: Option<&[String]>, max: usize) -> Vec<String> {
    items.unwrap_or_default().iter().take(max).cloned().collect()
}
