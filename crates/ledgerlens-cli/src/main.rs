//! LedgerLens CLI - Financial snapshots and AI insight reports
//!
//! Usage:
//!   ledgerlens init                                   Initialize database
//!   ledgerlens import-transactions --user U --file F  Import a CSV export
//!   ledgerlens generate --user U                      Generate an insight report
//!   ledgerlens ask --user U "question"                Ask the financial advisor

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::ImportAccounts { user, file } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import_accounts(&db, &user, &file)
        }
        Commands::ImportTransactions { user, file } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import_transactions(&db, &user, &file)
        }
        Commands::Snapshot { user, period_days } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_snapshot(&db, &config, &user, period_days)
        }
        Commands::Generate { user, period_days } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_generate(&db, &config, &user, period_days).await
        }
        Commands::GenerateAll { period_days } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_generate_all(&db, &config, period_days).await
        }
        Commands::Show { user, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_show(&db, &user, json)
        }
        Commands::Ask { user, question } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_ask(&db, &config, &user, &question).await
        }
        Commands::Config => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_config(&config)
        }
    }
}
