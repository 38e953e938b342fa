//! SnapSpend Core Library
//!
//! Shared functionality for the SnapSpend receipt tracker:
//! - Gemini gateway for receipt extraction, insights and chat
//! - Retry policy with exponential backoff for rate limits and overloads
//! - Spending aggregation by category and month
//! - Prompt library for customizable AI prompts
//! - Layered configuration (embedded TOML, override file, environment)
//! - Receipt persistence behind a small store trait

pub mod aggregate;
pub mod ai;
pub mod config;
pub mod error;
pub mod models;
pub mod prompts;
pub mod store;

/// Test utilities including mock Gemini server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{grand_total, monthly_spending, spending_by_category, summarize};
pub use ai::{
    AIBackend, AIClient, ExtractedReceipt, GeminiBackend, MockBackend, QuotaStatus, RetryPolicy,
    Sleeper, TokioSleeper,
};
pub use config::{Config, GatewayConfig, GenerationConfig, OperationConfig};
pub use error::{Error, FailureKind, Result};
pub use models::{
    Category, CategoryAggregate, ChatRole, ChatTurn, MonthlyAggregate, NewReceipt, Receipt,
    ReceiptItem, SpendingSummary,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use store::{JsonFileStore, MemoryStore, ReceiptStore};
