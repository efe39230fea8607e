//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(#[from] kiosk_feed::FeedError),

    #[error("Poller error: {0}")]
    Poll(#[from] kiosk_poll::PollError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] kiosk_telemetry::TelemetryError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] kiosk_dashboard::DashboardError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
