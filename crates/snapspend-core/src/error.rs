//! Error types for SnapSpend

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure before any HTTP response arrived
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 429, or another status whose body signals quota exhaustion
    #[error("Gemini API error ({status}): {message}")]
    RateLimited { status: u16, message: String },

    /// 503, or another status whose body signals overload
    #[error("Gemini API error ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    /// 4xx that is neither rate-limited nor overloaded
    #[error("Gemini API error ({status}): {message}")]
    ClientError { status: u16, message: String },

    /// Non-2xx outside the 4xx range that carries no unavailability signature
    #[error("Gemini API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// 2xx with an unusable body
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Which way a failure goes through the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Unavailable,
    NonRetryable,
}

impl Error {
    /// Classify this error for the retry policy
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::ServiceUnavailable { .. } => FailureKind::Unavailable,
            _ => FailureKind::NonRetryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() != FailureKind::NonRetryable
    }

    /// The error that caused the final attempt to fail, unwrapping `RetriesExhausted`
    pub fn root(&self) -> &Error {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
