//! Dashboard error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Frame sink unavailable: {0}")]
    SinkOpen(String),

    #[error("Frame sink write failed: {0}")]
    SinkWrite(#[from] std::io::Error),

    #[error("Invalid dashboard configuration: {0}")]
    InvalidConfig(String),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
