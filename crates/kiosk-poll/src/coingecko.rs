//! CoinGecko price polling.
//!
//! Loop: sleep → fetch → upsert. A successful cycle resets the delay to the
//! normal interval; HTTP 429 widens it to a jittered rate-limit window and
//! any other failure retries after a fixed delay. The loop never gives up.

use crate::client::HttpClient;
use crate::error::{PollError, PollResult};
use kiosk_core::{FeedStatus, TickerSource};
use kiosk_feed::Store;
use kiosk_telemetry::Metrics;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";

const POLLER: &str = "coingecko";

#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    /// Store key → CoinGecko coin id.
    pub ids: HashMap<String, String>,
    pub first_delay: Duration,
    pub normal_interval: Duration,
    pub rate_limit_delay: Duration,
    /// Upper bound of the uniform jitter added to `rate_limit_delay`.
    pub rate_limit_jitter: Duration,
    pub error_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API.to_string(),
            ids: HashMap::new(),
            first_delay: Duration::from_secs(1),
            normal_interval: Duration::from_secs(300),
            rate_limit_delay: Duration::from_secs(180),
            rate_limit_jitter: Duration::from_secs(30),
            error_delay: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl CoinGeckoConfig {
    /// Delay before the next cycle given the outcome of this one.
    ///
    /// `jitter` is a uniform sample in `[0, 1)`.
    pub fn next_delay<T>(&self, outcome: &PollResult<T>, jitter: f64) -> Duration {
        match outcome {
            Ok(_) => self.normal_interval,
            Err(PollError::RateLimited) => {
                self.rate_limit_delay + self.rate_limit_jitter.mul_f64(jitter.clamp(0.0, 1.0))
            }
            Err(_) => self.error_delay,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

/// One decoded price.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinPrice {
    pub key: String,
    pub price: f64,
    pub change_24h: f64,
}

pub struct CoinGeckoPoller {
    client: HttpClient,
    config: CoinGeckoConfig,
    store: Arc<Store>,
    shutdown: CancellationToken,
}

impl CoinGeckoPoller {
    pub fn new(
        config: CoinGeckoConfig,
        store: Arc<Store>,
        shutdown: CancellationToken,
    ) -> PollResult<Self> {
        Ok(Self {
            client: HttpClient::new(config.request_timeout)?,
            config,
            store,
            shutdown,
        })
    }

    pub fn has_coins(&self) -> bool {
        !self.config.ids.is_empty()
    }

    /// Fetch current prices for every configured coin.
    pub async fn fetch(&self) -> PollResult<Vec<CoinPrice>> {
        let mut ids: Vec<&str> = self.config.ids.values().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        let ids = ids.join(",");

        let url = format!("{}/simple/price", self.config.base_url.trim_end_matches('/'));
        let body: HashMap<String, SimplePrice> = self
            .client
            .get_json(
                &url,
                &[
                    ("ids", ids.as_str()),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                ],
            )
            .await?;

        let mut prices = Vec::new();
        for (key, coin_id) in &self.config.ids {
            let Some(entry) = body.get(coin_id) else {
                debug!(coin = %coin_id, "Coin missing from response");
                continue;
            };
            let Some(price) = entry.usd else {
                continue;
            };
            prices.push(CoinPrice {
                key: key.clone(),
                price,
                change_24h: entry.usd_24h_change.unwrap_or(0.0),
            });
        }
        Ok(prices)
    }

    /// One fetch-and-apply cycle. Returns the number of prices applied.
    pub async fn poll_once(&self) -> PollResult<usize> {
        let started = Instant::now();
        let prices = match self.fetch().await {
            Ok(prices) => prices,
            Err(e) => {
                Metrics::poll_failure(POLLER, e.kind());
                self.store
                    .set_source_status(TickerSource::CoinGecko, FeedStatus::Error);
                match &e {
                    PollError::RateLimited => warn!("CoinGecko rate limit hit"),
                    other => error!(error = %other, "CoinGecko poll failed"),
                }
                return Err(e);
            }
        };

        let applied = prices
            .iter()
            .filter(|p| {
                self.store.upsert_from_source(
                    TickerSource::CoinGecko,
                    &p.key,
                    p.price,
                    p.change_24h,
                    true,
                )
            })
            .count();
        for _ in 0..applied {
            Metrics::tick(POLLER);
        }
        Metrics::poll_success(POLLER, started.elapsed().as_secs_f64() * 1000.0);
        debug!(applied, "CoinGecko prices updated");
        Ok(applied)
    }

    /// Poll until shutdown.
    pub async fn run(self) {
        if !self.has_coins() {
            info!("No CoinGecko coins configured - poller exiting");
            return;
        }
        info!(coins = self.config.ids.len(), "CoinGecko poller started");

        let mut delay = self.config.first_delay;
        loop {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => break,
            }

            let outcome = self.poll_once().await;
            let jitter: f64 = rand::rng().random();
            delay = self.config.next_delay(&outcome, jitter);
            debug!(delay_secs = delay.as_secs_f64(), "Next CoinGecko poll");
        }
        info!("CoinGecko poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_delay() {
        let config = CoinGeckoConfig::default();

        let ok: PollResult<()> = Ok(());
        assert_eq!(config.next_delay(&ok, 0.5), Duration::from_secs(300));

        let limited: PollResult<()> = Err(PollError::RateLimited);
        assert_eq!(config.next_delay(&limited, 0.0), Duration::from_secs(180));
        assert_eq!(config.next_delay(&limited, 0.5), Duration::from_secs(195));
        let upper = config.next_delay(&limited, 0.999_999);
        assert!(upper >= Duration::from_secs(180) && upper <= Duration::from_secs(210));

        let failed: PollResult<()> = Err(PollError::Timeout("x".into()));
        assert_eq!(config.next_delay(&failed, 0.9), Duration::from_secs(60));
    }
}
