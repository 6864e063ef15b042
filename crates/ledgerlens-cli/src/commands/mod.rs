//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, config) and shared utilities (open_db, load_config)
//! - `import` - Account and transaction CSV import
//! - `insights` - Snapshot, report generation, and stored report display
//! - `advisor` - Conversational advisor

pub mod advisor;
pub mod core;
pub mod import;
pub mod insights;

// Re-export command functions for main.rs
pub use advisor::*;
pub use core::*;
pub use import::*;
pub use insights::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
