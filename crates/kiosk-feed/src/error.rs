//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Symbol already registered: {0}")]
    DuplicateSymbol(String),

    #[error("Core error: {0}")]
    Core(#[from] kiosk_core::CoreError),
}

pub type FeedResult<T> = Result<T, FeedError>;
