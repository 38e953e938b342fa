//! Shared command utilities
//!
//! This module contains:
//! - `load_config` - Layered config plus command-line overrides
//! - `open_store` - Open the JSON receipt store
//! - `ai_client` - Build the AI client, failing with setup hints
//! - `cmd_config_show` - Print the effective configuration

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use snapspend_core::{AIBackend, AIClient, Config, JsonFileStore, OperationConfig};

/// Load configuration, then apply `--store` and `--owner`
pub fn load_config(
    config_path: Option<&Path>,
    store: Option<&Path>,
    owner: Option<&str>,
) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    if let Some(store) = store {
        config.store_path = store.to_path_buf();
    }
    if let Some(owner) = owner.filter(|o| !o.is_empty()) {
        config.owner_id = owner.to_string();
    }

    Ok(config)
}

pub fn open_store(config: &Config) -> Result<JsonFileStore> {
    JsonFileStore::open(&config.store_path).with_context(|| {
        format!(
            "Failed to open receipt store at {}",
            config.store_path.display()
        )
    })
}

/// Build the configured AI client
pub fn ai_client(config: &Config) -> Result<AIClient> {
    let client = AIClient::from_config(config).ok_or_else(|| {
        anyhow!(
            "Gemini is not configured. Set GEMINI_API_KEY (or AI_BACKEND=mock for a dry run)."
        )
    })?;
    tracing::debug!(model = %client.model(), host = %client.host(), "AI client ready");
    Ok(client)
}

fn describe_operation(name: &str, op: &OperationConfig) {
    println!(
        "  {:<10} {} attempts, {} ms base delay, temperature {}, max {} tokens",
        name,
        op.max_attempts,
        op.base_delay.as_millis(),
        op.generation.temperature,
        op.generation.max_output_tokens
    );
}

/// Print the effective configuration (the API key is never shown)
pub fn cmd_config_show(config: &Config) -> Result<()> {
    let gateway = &config.gateway;

    println!("\n⚙️  SnapSpend Configuration");
    println!("{}", "─".repeat(50));
    println!("  Model:       {}", gateway.model);
    println!("  Endpoint:    {}", gateway.base_url);
    println!(
        "  API key:     {}",
        if gateway.api_key.is_some() {
            "✓ set"
        } else {
            "✗ not set (GEMINI_API_KEY)"
        }
    );
    println!("  Timeout:     {} s", gateway.timeout.as_secs());
    println!("  Owner:       {}", config.owner_id);
    println!("  Store:       {}", config.store_path.display());
    println!();
    println!("Retry policy (rate-limit floor {} ms):", gateway.rate_limit_floor.as_millis());
    describe_operation("extract", &gateway.extract);
    describe_operation("insights", &gateway.insights);
    describe_operation("chat", &gateway.chat);
    println!();
    println!(
        "Chat context: {} most recent receipts, {} items per line",
        gateway.chat_window, gateway.items_per_line
    );
    println!();

    Ok(())
}
