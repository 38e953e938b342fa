//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `assistant` - Gemini commands (insights, chat, quota)
//! - `core` - Shared utilities (load_config, open_store, ai_client) and config display
//! - `extract` - Read a receipt photo, optionally saving it
//! - `prompts` - Prompt library management commands
//! - `receipts` - Stored receipt commands (list, show, delete)
//! - `summary` - Spending totals by category and month

pub mod assistant;
pub mod core;
pub mod extract;
pub mod prompts;
pub mod receipts;
pub mod summary;

// Re-export command functions for main.rs
pub use assistant::*;
pub use core::*;
pub use extract::*;
pub use prompts::*;
pub use receipts::*;
pub use summary::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
