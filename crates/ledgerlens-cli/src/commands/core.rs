//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Shared utility to resolve configuration
//! - `cmd_init` - Initialize the database
//! - `cmd_config` - Print the effective configuration

use std::path::Path;

use anyhow::{Context, Result};
use ledgerlens_core::ai::ChatClient;
use ledgerlens_core::config::{default_config_path, Config};
use ledgerlens_core::db::Database;
use ledgerlens_core::prompts::PromptLibrary;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load configuration and apply `LEDGERLENS_LLM_*` environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::load(path).context("Failed to load configuration")?;
    config.apply_env();
    Ok(config)
}

/// Chat client for the configured model, if any
pub fn chat_client(config: &Config) -> Result<Option<ChatClient>> {
    ChatClient::from_config(&config.llm).context("Failed to create language-model client")
}

pub fn prompt_library() -> Result<PromptLibrary> {
    PromptLibrary::new().context("Failed to load prompts")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import accounts: ledgerlens import-accounts --user alice --file accounts.csv");
    println!("  2. Import transactions: ledgerlens import-transactions --user alice --file transactions.csv");
    println!("  3. Generate insights: ledgerlens generate --user alice");

    Ok(())
}

pub fn cmd_config(config: &Config) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&config.redacted())
        .context("Failed to render configuration")?;
    println!("{}", rendered);

    println!();
    println!(
        "Override file: {}",
        default_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    );
    if !config.llm.is_configured() {
        println!("No model configured: reports use the heuristic path");
    }

    Ok(())
}
