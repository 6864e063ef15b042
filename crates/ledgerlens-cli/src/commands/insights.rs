//! Insight command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use ledgerlens_core::config::Config;
use ledgerlens_core::db::Database;
use ledgerlens_core::insights::{BatchOutcome, GenerationStatus, InsightDocument, InsightGenerator};
use ledgerlens_core::snapshot::SnapshotBuilder;

use super::{chat_client, prompt_library, truncate};

fn period_or_default(config: &Config, period_days: Option<u32>) -> u32 {
    period_days.unwrap_or(config.report.default_period_days)
}

fn generator(db: &Database, config: &Config) -> Result<InsightGenerator> {
    Ok(InsightGenerator::new(
        Arc::new(db.clone()),
        chat_client(config)?,
        prompt_library()?,
        config.report.clone(),
    ))
}

/// Print the snapshot the agent's tools would see
pub fn cmd_snapshot(
    db: &Database,
    config: &Config,
    user_id: &str,
    period_days: Option<u32>,
) -> Result<()> {
    let period_days = period_or_default(config, period_days);
    let snapshot = SnapshotBuilder::new(db, Local::now().date_naive())
        .build(user_id, period_days)
        .context("Failed to build snapshot")?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

pub async fn cmd_generate(
    db: &Database,
    config: &Config,
    user_id: &str,
    period_days: Option<u32>,
) -> Result<()> {
    let period_days = period_or_default(config, period_days);
    let generator = generator(db, config)?;

    if generator.has_model() {
        println!("🤖 Generating insights for {} ({} days)...", user_id, period_days);
    } else {
        println!("📊 Generating insights for {} ({} days, no model configured)...", user_id, period_days);
        println!("   💡 Tip: Set LEDGERLENS_LLM_HOST and LEDGERLENS_LLM_MODEL for AI reports");
    }

    let outcome = generator
        .generate_for_user(user_id, period_days)
        .await
        .with_context(|| format!("Failed to generate insights for {}", user_id))?;

    let label = match outcome.status {
        GenerationStatus::Success => "✅ AI report",
        GenerationStatus::Heuristic => "📋 Heuristic report",
        GenerationStatus::Placeholder => "📭 No transactions in period",
    };
    println!("{} stored", label);
    if let Some(reason) = &outcome.fallback {
        println!("   Fallback: {:?}", reason);
    }
    if !outcome.tools_used.is_empty() {
        println!("   Tools used: {}", outcome.tools_used.join(", "));
    }

    println!();
    print_document(&outcome.insight);
    Ok(())
}

pub async fn cmd_generate_all(db: &Database, config: &Config, period_days: Option<u32>) -> Result<()> {
    let period_days = period_or_default(config, period_days);
    let generator = generator(db, config)?;

    println!("📊 Generating insights for all users ({} days)...", period_days);

    match generator.generate_for_all_users(period_days).await? {
        BatchOutcome::AlreadyRunning => {
            println!("⏳ A batch is already running");
        }
        BatchOutcome::Completed(summary) => {
            println!();
            println!("📊 Batch Results");
            println!("   ─────────────────────────────");
            println!("   Users: {}", summary.users);
            println!("   AI reports: {}", summary.success);
            println!("   Heuristic reports: {}", summary.heuristic);
            println!("   Placeholders: {}", summary.placeholder);
            if summary.failures.is_empty() {
                println!("✅ All users processed");
            } else {
                println!("⚠️  {} failures:", summary.failures.len());
                for failure in &summary.failures {
                    println!("   {}: {}", failure.user_id, truncate(&failure.error, 100));
                }
            }
        }
    }
    Ok(())
}

pub fn cmd_show(db: &Database, user_id: &str, json: bool) -> Result<()> {
    let Some(document) = db
        .get_insight_document(user_id)
        .context("Failed to load insight document")?
    else {
        println!("No insights stored for {}. Run 'ledgerlens generate --user {}' first.", user_id, user_id);
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print_document(&document);
    }
    Ok(())
}

fn print_document(document: &InsightDocument) {
    let context = &document.context;

    println!("{}", document.summary.headline);
    println!("{}", document.summary.narrative);
    println!();
    println!(
        "Period: {} to {} ({} days, {} transactions)",
        context.date_range.start, context.date_range.end, context.period_days, context.transaction_count
    );

    if !document.key_metrics.is_empty() {
        println!();
        println!("Key metrics:");
        for metric in &document.key_metrics {
            println!(
                "   {:<24} {}",
                truncate(&metric.label, 24),
                metric.display_value.as_deref().unwrap_or("-")
            );
        }
    }

    if !document.highlights.is_empty() {
        println!();
        println!("Highlights:");
        for highlight in &document.highlights {
            println!("   • {}", highlight);
        }
    }

    if !document.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for rec in &document.recommendations {
            println!("   → {}: {}", rec.title, rec.detail);
            if let Some(action) = &rec.action {
                println!("     Action: {}", action);
            }
        }
    }

    if !document.alerts.is_empty() {
        println!();
        println!("Alerts:");
        for alert in &document.alerts {
            println!("   ⚠️  {}", alert);
        }
    }

    println!();
    println!(
        "Generated {} by {} (v{})",
        document.generated_at.format("%Y-%m-%d %H:%M UTC"),
        context.generated_from,
        document.version
    );
}
