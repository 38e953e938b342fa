//! Shared types for the AI gateway
//!
//! Two groups live here: what the gateway hands back to callers
//! (`ExtractedReceipt`, `QuotaStatus`) and the generateContent wire format.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::GenerationConfig;
use crate::models::{Category, ReceiptItem};

/// MIME type assumed when the caller does not know better
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Guess an image MIME type from a file extension
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => DEFAULT_IMAGE_MIME,
    }
}

/// Structured fields read off a receipt photo
///
/// Every field is optional. `NewReceipt::from_extracted` applies the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedReceipt {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "nullable_items")]
    pub items: Vec<ReceiptItem>,
}

/// Result of a successful quota probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaStatus {
    pub model: String,
    /// Round trip of the probe request
    pub latency: Duration,
    pub reply: String,
}

/// Coerce a money amount that may arrive as a number or a string
///
/// Strings like `"12,50"`, `"R$ 12.50"` or `"1.234,56"` are accepted; the
/// right-most `,` or `.` is taken as the decimal separator.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let cleaned = cleaned.trim_end_matches([',', '.']);
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match cleaned.rfind([',', '.']) {
        Some(pos) => {
            let (int_part, frac_part) = cleaned.split_at(pos);
            let int_digits: String = int_part.chars().filter(|c| *c != ',' && *c != '.').collect();
            format!("{}.{}", int_digits, &frac_part[1..])
        }
        None => cleaned.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => parse_amount(&s),
        _ => None,
    })
}

/// Line item quantity or price: numbers, numeric strings, otherwise 0
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_amount(deserializer)?.unwrap_or(0.0))
}

/// Text that the model may send as `null` or as a bare number
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
                .ok()
        }
        _ => None,
    })
}

fn nullable_items<'de, D>(deserializer: D) -> std::result::Result<Vec<ReceiptItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ReceiptItem>>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// generateContent wire format
// =============================================================================

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: &'a [Content],
    pub generation_config: &'a GenerationConfig,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn with_role(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of every text part
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect()
    }
}

/// A piece of a turn: text or an inline binary blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: &str, data: String) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.to_string(),
                data,
            },
        }
    }
}

/// Base64 payload with its MIME type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Successful generateContent response
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, if it has any
    pub fn text(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(Content::text)
            .filter(|t| !t.is_empty())
    }
}

/// Error envelope on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    /// Canonical status name, e.g. `RESOURCE_EXHAUSTED`
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("12,50"), Some(12.5));
        assert_eq!(parse_amount("R$ 12.50"), Some(12.5));
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("42"), Some(42.0));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_parse_amount_trailing_separator() {
        assert_eq!(parse_amount("12.50."), Some(12.5));
        assert_eq!(parse_amount("12,50,"), Some(12.5));
        assert_eq!(parse_amount("R$ 30."), Some(30.0));
        assert_eq!(parse_amount("."), None);
    }

    #[test]
    fn test_extracted_receipt_lenient_fields() {
        let json = r#"{
            "totalAmount": "R$ 45,90",
            "date": "not a date",
            "time": "14:30",
            "storeName": "Mercado Central",
            "category": "alimentação",
            "items": null
        }"#;

        let receipt: ExtractedReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.total_amount, Some(45.9));
        assert_eq!(receipt.date, None);
        assert_eq!(receipt.time.as_deref(), Some("14:30"));
        assert_eq!(receipt.category, Some(Category::Food));
        assert!(receipt.items.is_empty());
    }

    #[test]
    fn test_extracted_receipt_missing_fields() {
        let receipt: ExtractedReceipt = serde_json::from_str("{}").unwrap();
        assert_eq!(receipt, ExtractedReceipt::default());
    }

    #[test]
    fn test_extracted_receipt_items() {
        let json = r#"{"totalAmount": 9.5, "date": "2024-05-02",
            "items": [{"name": "Coffee", "quantity": 2, "price": 4.75}]}"#;

        let receipt: ExtractedReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.total_amount, Some(9.5));
        assert_eq!(receipt.date, NaiveDate::from_ymd_opt(2024, 5, 2));
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].unit_price, 4.75);
    }

    #[test]
    fn test_item_null_price() {
        let json = r#"{"totalAmount": 10, "items": [{"name": "Pão", "quantity": 1, "price": null}]}"#;

        let receipt: ExtractedReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.total_amount, Some(10.0));
        assert_eq!(
            receipt.items,
            vec![ReceiptItem {
                name: "Pão".to_string(),
                quantity: 1.0,
                unit_price: 0.0,
            }]
        );
    }

    #[test]
    fn test_item_null_quantity_and_string_price() {
        let json = r#"{"items": [{"name": "Leite", "quantity": null, "price": "4,50"}]}"#;

        let receipt: ExtractedReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.items[0].quantity, 0.0);
        assert_eq!(receipt.items[0].unit_price, 4.5);
    }

    #[test]
    fn test_item_null_name_and_string_quantity() {
        let json = r#"{"items": [{"name": null, "quantity": "2", "unitPrice": 3}]}"#;

        let receipt: ExtractedReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.items[0].name, "");
        assert_eq!(receipt.items[0].quantity, 2.0);
        assert_eq!(receipt.items[0].unit_price, 3.0);
    }

    #[test]
    fn test_request_serialization() {
        let contents = vec![Content::user(vec![
            Part::text("Read this"),
            Part::inline_data("image/jpeg", "AAAA".to_string()),
        ])];
        let generation = GenerationConfig {
            temperature: 0.4,
            top_k: Some(32),
            top_p: Some(1.0),
            max_output_tokens: 2048,
        };
        let request = GenerateContentRequest {
            contents: &contents,
            generation_config: &generation,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Read this");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AAAA");
        assert_eq!(json["generationConfig"]["topK"], 32);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_quota_probe_config_omits_sampling() {
        let generation = GenerationConfig {
            temperature: 0.1,
            top_k: None,
            top_p: None,
            max_output_tokens: 5,
        };
        let json = serde_json::to_value(generation).unwrap();
        assert!(json.get("topK").is_none());
        assert!(json.get("topP").is_none());
    }

    #[test]
    fn test_response_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"there"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello there"));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());

        let no_content: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(no_content.text().is_none());
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("PNG"), "image/png");
        assert_eq!(mime_for_extension("jpg"), "image/jpeg");
        assert_eq!(mime_for_extension("bmp"), DEFAULT_IMAGE_MIME);
    }
}
