//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// SnapSpend - Track spending from receipt photos
#[derive(Parser)]
#[command(name = "snapspend")]
#[command(about = "Receipt photo expense tracker backed by Gemini", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Gateway config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Receipts JSON file (overrides SNAPSPEND_STORE)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Owner whose receipts are read and written (overrides SNAPSPEND_OWNER)
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a receipt photo with Gemini
    Extract {
        /// Receipt image (jpeg, png, webp, heic)
        image: PathBuf,

        /// MIME type (guessed from the file extension if not specified)
        #[arg(long)]
        mime: Option<String>,

        /// Save the extracted receipt to the store
        #[arg(long)]
        save: bool,
    },

    /// Manage stored receipts
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Spending totals by category and month
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask Gemini for commentary on your spending
    Insights,

    /// Ask questions about your receipts
    ///
    /// Without a message, starts an interactive session that keeps the
    /// conversation history until you type "exit" or close stdin.
    Chat {
        /// Question to ask
        message: Option<String>,
    },

    /// Check whether the Gemini quota is available (single request, no retries)
    Quota,

    /// Show the effective configuration
    Config,

    /// Manage AI prompts (list, show, customize)
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// List receipts, newest first
    #[command(alias = "ls")]
    List {
        /// Maximum number of receipts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one receipt with its items
    Show {
        /// Receipt ID
        id: String,
    },

    /// Delete a receipt
    #[command(alias = "rm")]
    Delete {
        /// Receipt ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., extract_receipt, chat_assistant)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
