//! Shared state store and candle aggregation.
//!
//! Every feed driver writes into a single `Store`; the dashboard reads
//! clones out of it. The store keeps four independent lock domains
//! (tickers, miner aggregate, hash history, network stats).

pub mod candle;
pub mod error;
pub mod store;

pub use candle::{bucket_start, CandleAggregator, CandleStep};
pub use error::{FeedError, FeedResult};
pub use store::{Store, StoreConfig};
