//! AI gateway abstraction
//!
//! This module provides a backend-agnostic interface for the three model
//! operations SnapSpend needs (receipt extraction, spending insights and the
//! chat assistant) plus a quota probe.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all AI operations
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `MockBackend`
//! - `retry`: exponential backoff shared by every Gemini operation
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Config::load()?;
//! if let Some(ai) = AIClient::from_config(&config) {
//!     let receipt = ai.extract_receipt(&bytes, "image/jpeg").await?;
//!     println!("Store: {:?}", receipt.store_name);
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (gemini, mock). Default: gemini
//! - `GEMINI_API_KEY`: API key (required for the gemini backend)
//! - `GEMINI_MODEL`: Model name (default: gemini-2.0-flash-exp)
//! - `GEMINI_BASE_URL`: API root (default: https://generativelanguage.googleapis.com)

mod gemini;
mod mock;
pub mod parsing;
pub mod retry;
pub mod types;

#[cfg(test)]
mod tests;

pub use gemini::{build_chat_contents, recent_receipt_lines, GeminiBackend};
pub use mock::MockBackend;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use types::*;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::models::{ChatTurn, Receipt};

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Read a receipt photo. `image_data` is sent as-is, base64 encoded.
    async fn extract_receipt(&self, image_data: &[u8], mime_type: &str)
        -> Result<ExtractedReceipt>;

    /// Free-text commentary on the given receipts (may be empty)
    async fn generate_insights(&self, receipts: &[Receipt]) -> Result<String>;

    /// Answer `message` with the receipts as context and `history` replayed
    async fn chat(&self, message: &str, receipts: &[Receipt], history: &[ChatTurn])
        -> Result<String>;

    /// Send a tiny request without retries to see whether the quota has reset
    async fn check_quota(&self) -> Result<QuotaStatus>;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Gemini generateContent API
    Gemini(GeminiBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from loaded configuration
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `gemini` (default): requires an API key in the config or `GEMINI_API_KEY`
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the gemini backend has no API key.
    pub fn from_config(config: &Config) -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" => GeminiBackend::from_config(config).map(AIClient::Gemini),
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to gemini");
                GeminiBackend::from_config(config).map(AIClient::Gemini)
            }
        }
    }

    /// Create an AI client from config files and environment variables
    pub fn from_env() -> Option<Self> {
        let config = Config::load().ok()?;
        Self::from_config(&config)
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Gemini(b) => AIClient::Gemini(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn extract_receipt(
        &self,
        image_data: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedReceipt> {
        match self {
            AIClient::Gemini(b) => b.extract_receipt(image_data, mime_type).await,
            AIClient::Mock(b) => b.extract_receipt(image_data, mime_type).await,
        }
    }

    async fn generate_insights(&self, receipts: &[Receipt]) -> Result<String> {
        match self {
            AIClient::Gemini(b) => b.generate_insights(receipts).await,
            AIClient::Mock(b) => b.generate_insights(receipts).await,
        }
    }

    async fn chat(
        &self,
        message: &str,
        receipts: &[Receipt],
        history: &[ChatTurn],
    ) -> Result<String> {
        match self {
            AIClient::Gemini(b) => b.chat(message, receipts, history).await,
            AIClient::Mock(b) => b.chat(message, receipts, history).await,
        }
    }

    async fn check_quota(&self) -> Result<QuotaStatus> {
        match self {
            AIClient::Gemini(b) => b.check_quota().await,
            AIClient::Mock(b) => b.check_quota().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
