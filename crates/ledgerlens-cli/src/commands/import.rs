//! Import command implementations

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use ledgerlens_core::db::Database;
use ledgerlens_core::import::{import_accounts, import_transactions};

fn open_csv(file: &Path) -> Result<BufReader<File>> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    Ok(BufReader::new(csv_file))
}

pub fn cmd_import_accounts(db: &Database, user_id: &str, file: &Path) -> Result<()> {
    println!("📥 Importing accounts for {} from {}...", user_id, file.display());

    let summary = import_accounts(db, user_id, open_csv(file)?)
        .with_context(|| format!("Failed to import accounts from {}", file.display()))?;

    println!("✅ Imported {} accounts", summary.imported);
    Ok(())
}

pub fn cmd_import_transactions(db: &Database, user_id: &str, file: &Path) -> Result<()> {
    println!(
        "📥 Importing transactions for {} from {}...",
        user_id,
        file.display()
    );

    let summary = import_transactions(db, user_id, open_csv(file)?)
        .with_context(|| format!("Failed to import transactions from {}", file.display()))?;

    println!("   Parsed: {}", summary.parsed);
    println!("   Imported: {}", summary.imported);
    if summary.skipped > 0 {
        println!("   Skipped (duplicates): {}", summary.skipped);
    }
    println!("✅ Import complete");
    Ok(())
}
