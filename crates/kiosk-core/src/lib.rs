//! Core data model for the crypto kiosk dashboard.
//!
//! This crate provides the value types shared by every feed and consumer:
//! - `TickerRecord`: per-symbol price, 24h change, status and candles
//! - `Candle`: one OHLC bucket
//! - `MinerAggregate`, `MinerReading`: local miner telemetry
//! - `NetworkStats`: Bitcoin network statistics
//! - `FeedStatus`, `TickerSource`, `ConnectionHealth`: status enums

pub mod error;
pub mod miner;
pub mod network;
pub mod ticker;

pub use error::{CoreError, Result};
pub use miner::{MinerAggregate, MinerReading};
pub use network::NetworkStats;
pub use ticker::{symbol_key, Candle, ConnectionHealth, FeedStatus, TickerRecord, TickerSource};
