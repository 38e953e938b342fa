//! SnapSpend CLI - Receipt photos in, spending answers out
//!
//! Usage:
//!   snapspend extract photo.jpg --save   Read a receipt photo and store it
//!   snapspend receipts list              Show stored receipts
//!   snapspend summary                    Spending by category and month
//!   snapspend insights                   Ask Gemini for commentary
//!   snapspend chat "Where does my money go?"
//!   snapspend quota                      Check whether the API quota has reset

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

    let load_config = || {
        commands::load_config(
            cli.config.as_deref(),
            cli.store.as_deref(),
            cli.owner.as_deref(),
        )
    };

    match cli.command {
        Commands::Extract { image, mime, save } => {
            let config = load_config()?;
            let ai = commands::ai_client(&config)?;
            let store = if save {
                Some(commands::open_store(&config)?)
            } else {
                None
            };
            commands::cmd_extract(&ai, store.as_ref(), &config.owner_id, &image, mime.as_deref())
                .await
        }
        Commands::Receipts { action } => {
            let config = load_config()?;
            let store = commands::open_store(&config)?;
            let currency = &config.gateway.currency;
            match action {
                Some(ReceiptsAction::List { limit }) => {
                    commands::cmd_receipts_list(&store, &config.owner_id, currency, limit)
                }
                None => commands::cmd_receipts_list(&store, &config.owner_id, currency, 20),
                Some(ReceiptsAction::Show { id }) => {
                    commands::cmd_receipts_show(&store, &id, currency)
                }
                Some(ReceiptsAction::Delete { id }) => commands::cmd_receipts_delete(&store, &id),
            }
        }
        Commands::Summary { json } => {
            let config = load_config()?;
            let store = commands::open_store(&config)?;
            commands::cmd_summary(&store, &config.owner_id, &config.gateway.currency, json)
        }
        Commands::Insights => {
            let config = load_config()?;
            let store = commands::open_store(&config)?;
            let ai = commands::ai_client(&config)?;
            commands::cmd_insights(&ai, &store, &config.owner_id).await
        }
        Commands::Chat { message } => {
            let config = load_config()?;
            let store = commands::open_store(&config)?;
            let ai = commands::ai_client(&config)?;
            match message {
                Some(message) => commands::cmd_chat(&ai, &store, &config.owner_id, &message).await,
                None => {
                    let stdin = std::io::stdin();
                    commands::cmd_chat_session(&ai, &store, &config.owner_id, stdin.lock()).await
                }
            }
        }
        Commands::Quota => {
            let config = load_config()?;
            let ai = commands::ai_client(&config)?;
            commands::cmd_quota(&ai).await
        }
        Commands::Config => commands::cmd_config_show(&load_config()?),
        Commands::Prompts { action } => match action {
            Some(PromptsAction::List) | None => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
