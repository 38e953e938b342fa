//! Receipt extraction command

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use snapspend_core::ai::types::{mime_for_extension, DEFAULT_IMAGE_MIME};
use snapspend_core::{AIBackend, AIClient, JsonFileStore, NewReceipt};

/// MIME type from `--mime`, else from the file extension
pub fn guess_mime<'a>(image: &Path, explicit: Option<&'a str>) -> &'a str {
    match explicit {
        Some(mime) => mime,
        None => image
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_for_extension)
            .unwrap_or(DEFAULT_IMAGE_MIME),
    }
}

/// Read a receipt photo, print what Gemini saw and optionally save it
pub async fn cmd_extract(
    ai: &AIClient,
    store: Option<&JsonFileStore>,
    owner: &str,
    image: &Path,
    mime: Option<&str>,
) -> Result<()> {
    if !image.exists() {
        return Err(anyhow!("File not found: {}", image.display()));
    }

    let image_data = std::fs::read(image).context("Failed to read receipt image")?;
    let mime_type = guess_mime(image, mime);

    println!("🧾 Reading receipt with {}...", ai.model());

    let extracted = ai
        .extract_receipt(&image_data, mime_type)
        .await
        .context("Could not read receipt")?;

    println!("  Store:    {}", extracted.store_name.as_deref().unwrap_or("Unknown"));
    println!(
        "  Date:     {}",
        extracted
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    );
    println!("  Time:     {}", extracted.time.as_deref().unwrap_or("Unknown"));
    println!("  Total:    {:.2}", extracted.total_amount.unwrap_or(0.0));
    println!(
        "  Category: {}",
        extracted.category.unwrap_or_default().as_str()
    );
    if !extracted.items.is_empty() {
        println!("  Items:");
        for item in &extracted.items {
            println!(
                "    {} x {} @ {:.2}",
                item.quantity, item.name, item.unit_price
            );
        }
    }

    let Some(store) = store else {
        println!("\nℹ️  Not saved (use --save to store this receipt)");
        return Ok(());
    };

    let image_path = image.display().to_string();
    let new = NewReceipt::from_extracted(&extracted, &image_path, Local::now().date_naive());
    let saved = store.add(owner, new).context("Failed to save receipt")?;

    println!("\n✅ Saved receipt {}", saved.id);

    Ok(())
}
