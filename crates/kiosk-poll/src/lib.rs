//! REST pollers and startup bootstrap.
//!
//! - `CoinGeckoPoller`: price polling with rate-limit aware backoff
//! - `MempoolPoller`: Bitcoin network statistics fetch chain
//! - `MinerPoller`: bounded-concurrency fan-out over local miners
//! - `Bootstrapper`: one-shot REST seeding of prices and candles

pub mod bootstrap;
pub mod client;
pub mod coingecko;
pub mod error;
pub mod mempool;
pub mod miners;

pub use bootstrap::{BootstrapConfig, Bootstrapper};
pub use client::{HttpClient, USER_AGENT};
pub use coingecko::{CoinGeckoConfig, CoinGeckoPoller};
pub use error::{PollError, PollResult};
pub use mempool::{MempoolConfig, MempoolPoller};
pub use miners::{parse_difficulty, MinerPoller, MinerPollerConfig};
