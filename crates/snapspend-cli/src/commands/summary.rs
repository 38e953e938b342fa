//! Spending summary command

use anyhow::{Context, Result};
use snapspend_core::{summarize, ReceiptStore};

/// Print totals by category and by month
pub fn cmd_summary(
    store: &dyn ReceiptStore,
    owner: &str,
    currency: &str,
    json: bool,
) -> Result<()> {
    let receipts = store.list(owner).context("Failed to load receipts")?;
    let summary = summarize(&receipts);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.receipt_count == 0 {
        println!("No receipts for '{}' yet", owner);
        return Ok(());
    }

    println!("\n📊 Spending Summary ({} receipts)", summary.receipt_count);
    println!("{}", "═".repeat(50));
    println!("  Total: {} {:.2}", currency, summary.grand_total);

    let mut categories = summary.by_category.clone();
    categories.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));

    println!("\nBy category:");
    for cat in &categories {
        println!(
            "  {:<10} {} {:>9.2}  {:>5.1}%  ({})",
            cat.category.as_str(),
            currency,
            cat.total_amount,
            cat.percentage_of_grand_total,
            cat.count
        );
    }

    println!("\nBy month:");
    for month in &summary.by_month {
        println!(
            "  {:<10} {} {:>9.2}  ({} receipts)",
            month.month_key, currency, month.total_amount, month.receipt_count
        );
    }

    println!();
    Ok(())
}
