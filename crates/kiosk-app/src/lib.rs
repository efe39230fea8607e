//! Crypto kiosk live-data dashboard.
//!
//! Wires every component together:
//! - Startup wait for the network and REST bootstrap
//! - Binance and Kraken streaming drivers
//! - CoinGecko, mempool.space and miner pollers
//! - Connectivity monitor and health aggregation
//! - Fixed-cadence frame loop into the frame sink

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
