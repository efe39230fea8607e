//! Prometheus metrics and structured logging for the crypto kiosk.
//!
//! - Prometheus collectors for feed state, polling and miner telemetry
//! - Structured logging with tracing (JSON in production)
//! - Periodic feed statistics summary

pub mod error;
pub mod feed_stats;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use feed_stats::{FeedStatsReporter, SourceStats};
pub use logging::init_logging;
pub use metrics::Metrics;
