//! Bitcoin network statistics from mempool.space.
//!
//! Each cycle walks a dependent chain:
//! fees → tip height → block hash → block detail → 3-month hashrate.
//! The store only ever sees a complete record or an all-absent one.

use crate::client::HttpClient;
use crate::error::{PollError, PollResult};
use kiosk_core::NetworkStats;
use kiosk_feed::Store;
use kiosk_telemetry::Metrics;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const MEMPOOL_API: &str = "https://mempool.space";

const POLLER: &str = "mempool";

/// Hashrate in H/s divided by this gives EH/s.
const HASHES_PER_EXAHASH: f64 = 1e18;

#[derive(Debug, Clone)]
pub struct MempoolConfig {
    pub base_url: String,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            base_url: MEMPOOL_API.to_string(),
            interval: Duration::from_secs(25),
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Fees {
    #[serde(rename = "halfHourFee")]
    half_hour_fee: f64,
}

#[derive(Debug, Default, Deserialize)]
struct PoolInfo {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlockExtras {
    #[serde(default)]
    pool: Option<PoolInfo>,
}

#[derive(Debug, Deserialize)]
struct BlockDetail {
    difficulty: f64,
    #[serde(default)]
    extras: Option<BlockExtras>,
}

impl BlockDetail {
    fn pool_name(&self) -> String {
        self.extras
            .as_ref()
            .and_then(|e| e.pool.as_ref())
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Hashrate {
    #[serde(rename = "currentHashrate")]
    current_hashrate: f64,
}

pub struct MempoolPoller {
    client: HttpClient,
    config: MempoolConfig,
    store: Arc<Store>,
    shutdown: CancellationToken,
}

impl MempoolPoller {
    pub fn new(config: MempoolConfig, store: Arc<Store>, shutdown: CancellationToken) -> PollResult<Self> {
        Ok(Self {
            client: HttpClient::new(config.request_timeout)?,
            config,
            store,
            shutdown,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Run the full chain. Any failed step fails the whole fetch.
    pub async fn fetch_stats(&self) -> PollResult<NetworkStats> {
        let fees: Fees = self.client.get_json(&self.url("/api/v1/fees/precise"), &[]).await?;

        let height_text = self.client.get_text(&self.url("/api/blocks/tip/height")).await?;
        let height: u64 = height_text
            .parse()
            .map_err(|_| PollError::Parse(format!("invalid tip height: {height_text:?}")))?;

        let hash = self
            .client
            .get_text(&self.url(&format!("/api/block-height/{height}")))
            .await?;
        if hash.is_empty() {
            return Err(PollError::Parse(format!("empty block hash at height {height}")));
        }

        let block: BlockDetail = self
            .client
            .get_json(&self.url(&format!("/api/v1/block/{hash}")), &[])
            .await?;

        let hashrate: Hashrate = self
            .client
            .get_json(&self.url("/api/v1/mining/hashrate/3m"), &[])
            .await?;

        Ok(NetworkStats::complete(
            fees.half_hour_fee,
            height,
            block.pool_name(),
            hashrate.current_hashrate / HASHES_PER_EXAHASH,
            block.difficulty,
        ))
    }

    /// One cycle: replace the stats on success, clear them on any failure.
    pub async fn poll_once(&self) -> bool {
        let started = Instant::now();
        match self.fetch_stats().await {
            Ok(stats) => {
                debug!(height = ?stats.block_height, pool = ?stats.mining_pool, "Network stats updated");
                self.store.replace_network_stats(stats);
                Metrics::network_stats_valid(true);
                Metrics::poll_success(POLLER, started.elapsed().as_secs_f64() * 1000.0);
                true
            }
            Err(e) => {
                error!(error = %e, "Network stats fetch failed");
                self.store.clear_network_stats();
                Metrics::network_stats_valid(false);
                Metrics::poll_failure(POLLER, e.kind());
                false
            }
        }
    }

    pub async fn run(self) {
        info!(interval_secs = self.config.interval.as_secs(), "Network stats poller started");
        loop {
            self.poll_once().await;
            tokio::select! {
                () = tokio::time::sleep(self.config.interval) => {}
                () = self.shutdown.cancelled() => break,
            }
        }
        info!("Network stats poller stopped");
    }
}
