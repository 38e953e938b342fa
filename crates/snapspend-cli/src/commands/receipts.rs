//! Stored receipt commands

use anyhow::{Context, Result};
use snapspend_core::{JsonFileStore, ReceiptStore};

use super::truncate;

/// List receipts for `owner`, newest first
pub fn cmd_receipts_list(
    store: &JsonFileStore,
    owner: &str,
    currency: &str,
    limit: usize,
) -> Result<()> {
    let receipts = store.list(owner).context("Failed to load receipts")?;

    if receipts.is_empty() {
        println!("No receipts for '{}' yet", owner);
        println!("Add one with: snapspend extract photo.jpg --save");
        return Ok(());
    }

    println!("\n🧾 Receipts ({})", receipts.len());
    println!("{}", "─".repeat(90));

    for receipt in receipts.iter().take(limit) {
        println!(
            "  {} {:>5}  {:<24} {} {:>9.2}  {:<10} {}",
            receipt.date,
            receipt.time,
            truncate(&receipt.store_name, 24),
            currency,
            receipt.total_amount,
            receipt.category.as_str(),
            receipt.id
        );
    }

    if receipts.len() > limit {
        println!(
            "  ... and {} more (use --limit to show more)",
            receipts.len() - limit
        );
    }

    println!();
    Ok(())
}

/// Show a single receipt with its line items
pub fn cmd_receipts_show(store: &JsonFileStore, id: &str, currency: &str) -> Result<()> {
    let receipt = store.get(id)?;

    println!("\n🧾 {}", receipt.store_name);
    println!("{}", "─".repeat(50));
    println!("  ID:       {}", receipt.id);
    println!("  Date:     {} {}", receipt.date, receipt.time);
    println!("  Total:    {} {:.2}", currency, receipt.total_amount);
    println!("  Category: {}", receipt.category.as_str());
    println!("  Image:    📷 {}", receipt.image_path);
    println!("  Added:    {}", receipt.created_at.format("%Y-%m-%d %H:%M UTC"));

    if receipt.items.is_empty() {
        println!("\n  (no line items)");
    } else {
        println!("\n  Items:");
        for item in &receipt.items {
            println!(
                "    {:<30} {:>6} x {} {:.2}",
                truncate(&item.name, 30),
                item.quantity,
                currency,
                item.unit_price
            );
        }
    }

    println!();
    Ok(())
}

pub fn cmd_receipts_delete(store: &JsonFileStore, id: &str) -> Result<()> {
    let removed = store.delete(id)?;
    println!(
        "🗑️  Deleted receipt {} ({}, {:.2})",
        removed.id, removed.store_name, removed.total_amount
    );
    Ok(())
}
