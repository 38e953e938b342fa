//! Data models for SnapSpend

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::ExtractedReceipt;

/// Spending category assigned by the extraction model
///
/// Deserialization is lenient: the model sometimes answers with Portuguese
/// labels (older receipts were captured in pt-BR) or with something outside
/// the set entirely. Anything unrecognised becomes `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Category {
    Food,
    Transport,
    Leisure,
    Health,
    Education,
    Clothing,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Leisure => "leisure",
            Self::Health => "health",
            Self::Education => "education",
            Self::Clothing => "clothing",
            Self::Other => "other",
        }
    }

    pub fn all() -> &'static [Category] {
        &[
            Self::Food,
            Self::Transport,
            Self::Leisure,
            Self::Health,
            Self::Education,
            Self::Clothing,
            Self::Other,
        ]
    }

    /// Lenient label lookup, never fails
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "food" | "alimentação" | "alimentacao" => Self::Food,
            "transport" | "transporte" => Self::Transport,
            "leisure" | "lazer" => Self::Leisure,
            "health" | "saúde" | "saude" => Self::Health,
            "education" | "educação" | "educacao" => Self::Education,
            "clothing" | "vestuário" | "vestuario" => Self::Clothing,
            _ => Self::Other,
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchased line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    #[serde(default, deserialize_with = "crate::ai::types::lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "crate::ai::types::lenient_number")]
    pub quantity: f64,
    /// Unit price; the model's JSON calls this `price`
    #[serde(
        rename = "price",
        alias = "unitPrice",
        default,
        deserialize_with = "crate::ai::types::lenient_number"
    )]
    pub unit_price: f64,
}

/// A stored receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    pub owner_id: String,
    pub image_path: String,
    pub total_amount: f64,
    pub date: NaiveDate,
    pub time: String,
    pub store_name: String,
    pub category: Category,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    /// Year-month key (`YYYY-MM`) used for monthly rollups
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

/// Write-side receipt, built from an extraction with defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct NewReceipt {
    pub image_path: String,
    pub total_amount: f64,
    pub date: NaiveDate,
    pub time: String,
    pub store_name: String,
    pub category: Category,
    pub items: Vec<ReceiptItem>,
}

impl NewReceipt {
    /// Fill in whatever the model left out.
    ///
    /// `today` stands in for a missing date so callers control the clock.
    pub fn from_extracted(extracted: &ExtractedReceipt, image_path: &str, today: NaiveDate) -> Self {
        Self {
            image_path: image_path.to_string(),
            total_amount: extracted.total_amount.unwrap_or(0.0).max(0.0),
            date: extracted.date.unwrap_or(today),
            time: extracted
                .time
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "00:00".to_string()),
            store_name: extracted
                .store_name
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            category: extracted.category.unwrap_or_default(),
            items: extracted.items.clone(),
        }
    }
}

/// Who said a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Role name on the turn-alternating wire protocol
    pub fn wire_role(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "model",
        }
    }
}

/// One message in a conversation with the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Spending rolled up for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregate {
    pub category: Category,
    pub total_amount: f64,
    pub count: usize,
    pub percentage_of_grand_total: f64,
}

/// Spending rolled up for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAggregate {
    /// `YYYY-MM`
    pub month_key: String,
    pub total_amount: f64,
    pub receipt_count: usize,
}

/// Everything the summary view and the insights prompt need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingSummary {
    pub grand_total: f64,
    pub receipt_count: usize,
    pub by_category: Vec<CategoryAggregate>,
    pub by_month: Vec<MonthlyAggregate>,
}
