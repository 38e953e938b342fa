//! Mock backend for testing
//!
//! Returns predictable responses for every gateway operation.
//! Useful for unit tests and for running the CLI without an API key
//! (`AI_BACKEND=mock`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::aggregate::summarize;
use crate::error::{Error, Result};
use crate::models::{Category, ChatTurn, Receipt, ReceiptItem};

use super::parsing::user_message;
use super::types::{ExtractedReceipt, QuotaStatus};
use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether the quota probe should succeed
    pub healthy: bool,
    model: String,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            model: "mock".to_string(),
        }
    }

    /// A mock whose quota probe reports the service as unavailable
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn extract_receipt(
        &self,
        image_data: &[u8],
        _mime_type: &str,
    ) -> Result<ExtractedReceipt> {
        if image_data.is_empty() {
            return Err(Error::ClientError {
                status: 400,
                message: user_message(400, "empty image"),
            });
        }

        Ok(ExtractedReceipt {
            total_amount: Some(27.0),
            date: NaiveDate::from_ymd_opt(2024, 1, 15),
            time: Some("10:30".to_string()),
            store_name: Some("Mock Store".to_string()),
            category: Some(Category::Food),
            items: vec![
                ReceiptItem {
                    name: "Bread".to_string(),
                    quantity: 2.0,
                    unit_price: 5.0,
                },
                ReceiptItem {
                    name: "Coffee".to_string(),
                    quantity: 1.0,
                    unit_price: 17.0,
                },
            ],
        })
    }

    async fn generate_insights(&self, receipts: &[Receipt]) -> Result<String> {
        let summary = summarize(receipts);
        let top = summary
            .by_category
            .iter()
            .max_by(|a, b| a.total_amount.total_cmp(&b.total_amount))
            .map(|c| c.category.as_str())
            .unwrap_or("none");

        Ok(format!(
            "📊 {} purchases totalling {:.2}. Biggest category: {}.",
            summary.receipt_count, summary.grand_total, top
        ))
    }

    async fn chat(
        &self,
        message: &str,
        receipts: &[Receipt],
        history: &[ChatTurn],
    ) -> Result<String> {
        Ok(format!(
            "You asked \"{}\". I can see {} receipts and {} earlier messages.",
            message,
            receipts.len(),
            history.len()
        ))
    }

    async fn check_quota(&self) -> Result<QuotaStatus> {
        if !self.healthy {
            return Err(Error::ServiceUnavailable {
                status: 503,
                message: user_message(503, ""),
            });
        }

        Ok(QuotaStatus {
            model: self.model.clone(),
            latency: Duration::ZERO,
            reply: "OK".to_string(),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
