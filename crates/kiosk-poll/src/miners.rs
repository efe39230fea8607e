//! Local miner fan-out poller.
//!
//! Every cycle asks each configured miner for `/api/system/info`, at most
//! `concurrency` requests in flight, and reduces the answers into one
//! `MinerAggregate`. A miner that errors or times out counts as
//! disconnected with zero hash rate.

use crate::client::USER_AGENT;
use crate::error::{PollError, PollResult};
use futures_util::stream::{self, StreamExt};
use kiosk_core::{MinerAggregate, MinerReading};
use kiosk_feed::Store;
use kiosk_telemetry::Metrics;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const POLLER: &str = "miners";

#[derive(Debug, Clone)]
pub struct MinerPollerConfig {
    /// Miner addresses (`192.168.1.50`) or full info URLs.
    pub endpoints: Vec<String>,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub concurrency: usize,
    /// TH/s above which a miner counts as active.
    pub active_threshold: f64,
}

impl Default for MinerPollerConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(4),
            concurrency: 16,
            active_threshold: 0.25,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SystemInfo {
    /// GH/s.
    #[serde(rename = "hashRate", default)]
    hash_rate: Option<f64>,
    #[serde(rename = "bestDiff", default)]
    best_diff: Option<Value>,
}

/// Parse a difficulty reported as a number or a suffixed string (`"4.29G"`).
pub fn parse_difficulty(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            let (digits, scale) = match s.chars().last()? {
                'k' | 'K' => (&s[..s.len() - 1], 1e3),
                'M' => (&s[..s.len() - 1], 1e6),
                'G' => (&s[..s.len() - 1], 1e9),
                'T' => (&s[..s.len() - 1], 1e12),
                'P' => (&s[..s.len() - 1], 1e15),
                _ => (s, 1.0),
            };
            digits.trim().parse::<f64>().ok().map(|v| v * scale)
        }
        _ => None,
    }
}

pub struct MinerPoller {
    client: Client,
    config: MinerPollerConfig,
    store: Arc<Store>,
    shutdown: CancellationToken,
}

impl MinerPoller {
    pub fn new(
        config: MinerPollerConfig,
        store: Arc<Store>,
        shutdown: CancellationToken,
    ) -> PollResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PollError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            store,
            shutdown,
        })
    }

    pub fn endpoint_url(endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}/api/system/info")
        }
    }

    async fn fetch_reading(&self, endpoint: &str) -> PollResult<MinerReading> {
        let url = Self::endpoint_url(endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::HttpClient(format!("{url}: {e}")))?;
        if !response.status().is_success() {
            return Err(PollError::Status {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        let info: SystemInfo = response
            .json()
            .await
            .map_err(|e| PollError::Parse(format!("{url}: {e}")))?;

        let hashrate_ths = info.hash_rate.unwrap_or(0.0) / 1000.0;
        let best = info.best_diff.as_ref().and_then(parse_difficulty).unwrap_or(0.0);
        Ok(MinerReading::online(hashrate_ths, best))
    }

    /// Read one miner; any failure yields a disconnected reading.
    pub async fn read_miner(&self, endpoint: &str) -> MinerReading {
        match self.fetch_reading(endpoint).await {
            Ok(reading) => reading,
            Err(e) => {
                trace!(%endpoint, error = %e, "Miner unreachable");
                MinerReading::DISCONNECTED
            }
        }
    }

    /// Poll every miner once and reduce.
    pub async fn poll_cycle(&self) -> MinerAggregate {
        let fetches: Vec<_> = self
            .config
            .endpoints
            .iter()
            .map(|endpoint| self.read_miner(endpoint))
            .collect();
        let readings: Vec<MinerReading> = stream::iter(fetches)
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        MinerAggregate::from_readings(
            &readings,
            self.config.active_threshold,
            self.config.endpoints.len(),
        )
    }

    /// Poll until shutdown. Returns immediately when no miners are configured.
    pub async fn run(self) {
        if self.config.endpoints.is_empty() {
            info!("No miners configured - miner poller exiting");
            return;
        }
        info!(miners = self.config.endpoints.len(), "Miner poller started");

        loop {
            let started = Instant::now();
            let aggregate = self.poll_cycle().await;
            debug!(
                hashrate_ths = aggregate.total_hashrate,
                connected = aggregate.connected_count,
                active = aggregate.active_count,
                "Miner cycle complete"
            );
            self.store.record_miner_cycle(aggregate);
            Metrics::miner_cycle(
                aggregate.connected_count,
                aggregate.active_count,
                aggregate.total_hashrate,
            );
            Metrics::poll_success(POLLER, started.elapsed().as_secs_f64() * 1000.0);

            tokio::select! {
                () = tokio::time::sleep(self.config.interval) => {}
                () = self.shutdown.cancelled() => break,
            }
        }
        info!("Miner poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_difficulty() {
        assert_eq!(parse_difficulty(&json!(1234)), Some(1234.0));
        assert_eq!(parse_difficulty(&json!("4.29G")), Some(4.29e9));
        assert_eq!(parse_difficulty(&json!("12.5M")), Some(12.5e6));
        assert_eq!(parse_difficulty(&json!("850k")), Some(850e3));
        assert_eq!(parse_difficulty(&json!("777")), Some(777.0));
        assert_eq!(parse_difficulty(&json!("n/a")), None);
        assert_eq!(parse_difficulty(&json!("")), None);
        assert_eq!(parse_difficulty(&json!(null)), None);
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            MinerPoller::endpoint_url("192.168.1.50"),
            "http://192.168.1.50/api/system/info"
        );
        assert_eq!(
            MinerPoller::endpoint_url("http://127.0.0.1:9000/api/system/info"),
            "http://127.0.0.1:9000/api/system/info"
        );
    }
}
