//! Poller error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited by upstream")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PollError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpClient(_) => "http",
            Self::Timeout(_) => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Status { .. } => "status",
            Self::Parse(_) | Self::Json(_) => "parse",
        }
    }
}

pub type PollResult<T> = Result<T, PollError>;
