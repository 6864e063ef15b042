//! Advisor command implementation

use std::sync::Arc;

use anyhow::{Context, Result};
use ledgerlens_core::advisor::{AdvisorAnswer, FinancialAdvisor, Priority, StructuredAnswer};
use ledgerlens_core::config::Config;
use ledgerlens_core::db::Database;

use super::{chat_client, prompt_library};

pub async fn cmd_ask(db: &Database, config: &Config, user_id: &str, question: &str) -> Result<()> {
    let advisor = FinancialAdvisor::new(
        Arc::new(db.clone()),
        chat_client(config)?,
        prompt_library()?,
        config.advisor.clone(),
    );

    let response = advisor
        .answer_question(user_id, question, &[])
        .await
        .context("Advisor request failed")?;

    match &response.answer {
        AdvisorAnswer::Structured(answer) => print_structured(answer),
        AdvisorAnswer::Plain { answer, tools_used } => {
            println!("{}", answer);
            if !tools_used.is_empty() {
                println!();
                println!("Tools used: {}", tools_used.join(", "));
            }
        }
        AdvisorAnswer::Unavailable(answer) => {
            println!("⚠️  {}", answer.summary);
            println!("   💡 Tip: Set LEDGERLENS_LLM_HOST and LEDGERLENS_LLM_MODEL to enable the advisor");
        }
    }
    Ok(())
}

fn print_structured(answer: &StructuredAnswer) {
    println!("{}", answer.summary);

    if !answer.analysis.key_metrics.is_empty() {
        println!();
        for metric in &answer.analysis.key_metrics {
            println!("   {}: {} ({})", metric.metric, metric.value, metric.assessment);
        }
    }

    if !answer.analysis.insights.is_empty() {
        println!();
        for insight in &answer.analysis.insights {
            println!("   • {}", insight);
        }
    }

    if !answer.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for rec in &answer.recommendations {
            let marker = match rec.priority {
                Priority::High => "🔴",
                Priority::Medium => "🟡",
                Priority::Low => "🟢",
            };
            println!("   {} {} ({})", marker, rec.action, rec.expected_impact);
        }
    }

    println!();
    println!(
        "Tools used: {} ({} iterations)",
        answer.tools_used.join(", "),
        answer.iterations
    );
}
