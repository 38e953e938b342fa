//! Gemini-backed commands: insights, chat and the quota check

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use snapspend_core::{AIBackend, AIClient, ChatTurn, FailureKind, ReceiptStore};

/// Ask for commentary on every stored receipt
pub async fn cmd_insights(ai: &AIClient, store: &dyn ReceiptStore, owner: &str) -> Result<()> {
    let receipts = store.list(owner).context("Failed to load receipts")?;

    println!("💡 Analyzing {} receipts with {}...\n", receipts.len(), ai.model());

    let insights = ai
        .generate_insights(&receipts)
        .await
        .context("Could not generate insights")?;

    println!("{}", insights.trim_end());
    println!();
    Ok(())
}

/// Ask a single question with no prior history
pub async fn cmd_chat(
    ai: &AIClient,
    store: &dyn ReceiptStore,
    owner: &str,
    message: &str,
) -> Result<()> {
    let receipts = store.list(owner).context("Failed to load receipts")?;
    let reply = ai
        .chat(message, &receipts, &[])
        .await
        .context("Chat request failed")?;

    println!("🤖 {}", reply.trim_end());
    Ok(())
}

/// Interactive chat reading questions line by line from `input`
pub async fn cmd_chat_session<R: BufRead>(
    ai: &AIClient,
    store: &dyn ReceiptStore,
    owner: &str,
    input: R,
) -> Result<()> {
    let history = run_chat_session(ai, store, owner, input).await?;
    tracing::debug!(turns = history.len(), "Chat session ended");
    Ok(())
}

/// Drive the session and return the conversation that was kept
///
/// Failed questions are reported and left out of the history.
pub async fn run_chat_session<R: BufRead>(
    ai: &AIClient,
    store: &dyn ReceiptStore,
    owner: &str,
    input: R,
) -> Result<Vec<ChatTurn>> {
    let receipts = store.list(owner).context("Failed to load receipts")?;
    let mut history: Vec<ChatTurn> = Vec::new();

    println!(
        "💬 Chatting about {} receipts. Type 'exit' to quit.\n",
        receipts.len()
    );

    let mut lines = input.lines();
    loop {
        print!("you> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read input")?;
        let message = line.trim();

        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        match ai.chat(message, &receipts, &history).await {
            Ok(reply) => {
                println!("🤖 {}\n", reply.trim_end());
                history.push(ChatTurn::user(message));
                history.push(ChatTurn::assistant(reply));
            }
            Err(e) => println!("❌ {}\n", e),
        }
    }

    Ok(history)
}

/// Send one tiny request, without retries, to see if the quota has reset
pub async fn cmd_quota(ai: &AIClient) -> Result<()> {
    println!("🔍 Checking Gemini quota for {}...\n", ai.model());

    match ai.check_quota().await {
        Ok(status) => {
            println!("✅ Quota available ({} ms)", status.latency.as_millis());
            println!("   Model reply: {}", status.reply.trim());
            Ok(())
        }
        Err(e) if e.kind() == FailureKind::RateLimited => {
            println!("❌ Still rate limited");
            println!("   {}", e);
            println!("\nWait a minute and run 'snapspend quota' again.");
            Ok(())
        }
        Err(e) => Err(e).context("Quota check failed"),
    }
}
