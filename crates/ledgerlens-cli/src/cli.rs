//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LedgerLens - Financial snapshots and AI insight reports
#[derive(Parser)]
#[command(name = "ledgerlens")]
#[command(about = "Snapshot engine and tool-calling insight agent for personal finances", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "ledgerlens.db", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set LEDGERLENS_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import a user's accounts from CSV
    ImportAccounts {
        /// User the accounts belong to
        #[arg(short, long)]
        user: String,

        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Import a user's transactions from CSV (duplicates are skipped)
    ImportTransactions {
        /// User the transactions belong to
        #[arg(short, long)]
        user: String,

        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print a user's financial snapshot as JSON
    Snapshot {
        #[arg(short, long)]
        user: String,

        /// Period length in days (defaults to report.default_period_days)
        #[arg(long)]
        period_days: Option<u32>,
    },

    /// Generate and store a user's insight report
    Generate {
        #[arg(short, long)]
        user: String,

        /// Period length in days (defaults to report.default_period_days)
        #[arg(long)]
        period_days: Option<u32>,
    },

    /// Generate insight reports for every user with connected accounts
    GenerateAll {
        /// Period length in days (defaults to report.default_period_days)
        #[arg(long)]
        period_days: Option<u32>,
    },

    /// Show a user's stored insight report
    Show {
        #[arg(short, long)]
        user: String,

        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },

    /// Ask the financial advisor a question
    Ask {
        #[arg(short, long)]
        user: String,

        /// The question, e.g. "How long until I save $10,000?"
        question: String,
    },

    /// Print the effective configuration (API key redacted)
    Config,
}
