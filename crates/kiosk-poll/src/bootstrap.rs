//! Startup bootstrap over REST.
//!
//! Seeds prices (and, for main symbols, candle history) before the live
//! feeds start so the dashboard has something to show immediately.
//! Every failure is logged and skipped.

use crate::client::HttpClient;
use crate::error::{PollError, PollResult};
use chrono::DateTime;
use futures_util::stream::{self, StreamExt};
use kiosk_core::{Candle, TickerSource};
use kiosk_feed::Store;
use kiosk_telemetry::Metrics;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BINANCE_REST: &str = "https://api.binance.com";
pub const KRAKEN_REST: &str = "https://api.kraken.com";

const POLLER: &str = "bootstrap";

/// Binance kline intervals with their widths in seconds.
const KLINE_INTERVALS: [(&str, u64); 13] = [
    ("1m", 60),
    ("3m", 180),
    ("5m", 300),
    ("15m", 900),
    ("30m", 1_800),
    ("1h", 3_600),
    ("2h", 7_200),
    ("4h", 14_400),
    ("6h", 21_600),
    ("8h", 28_800),
    ("12h", 43_200),
    ("1d", 86_400),
    ("3d", 259_200),
];

/// Binance caps a klines request at this many rows.
const KLINE_LIMIT_MAX: u64 = 1_000;

/// Widest Binance interval that tiles a bucket of `candle_seconds`.
///
/// Buckets that no interval divides fall back to `1m` and are merged on load.
pub fn kline_interval_for(candle_seconds: u64) -> (&'static str, u64) {
    KLINE_INTERVALS
        .iter()
        .rev()
        .find(|(_, secs)| *secs <= candle_seconds && candle_seconds % secs == 0)
        .copied()
        .unwrap_or(KLINE_INTERVALS[0])
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub binance_base_url: String,
    pub kraken_base_url: String,
    pub kline_interval: String,
    pub kline_limit: u32,
    pub request_timeout: Duration,
    pub concurrency: usize,
}

impl BootstrapConfig {
    /// Kline interval and limit covering `history` closed buckets plus the open one.
    pub fn with_candles(mut self, candle_seconds: u64, history: usize) -> Self {
        let (interval, interval_secs) = kline_interval_for(candle_seconds);
        let per_bucket = candle_seconds.div_ceil(interval_secs).max(1);
        let wanted = per_bucket.saturating_mul(history as u64 + 1);
        self.kline_interval = interval.to_string();
        self.kline_limit = wanted.clamp(1, KLINE_LIMIT_MAX) as u32;
        self
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            binance_base_url: BINANCE_REST.to_string(),
            kraken_base_url: KRAKEN_REST.to_string(),
            kline_interval: "1m".to_string(),
            kline_limit: 60,
            request_timeout: Duration::from_secs(10),
            concurrency: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Ticker24h {
    #[serde(rename = "lastPrice")]
    last_price: String,
    #[serde(rename = "priceChangePercent")]
    price_change_percent: String,
}

#[derive(Debug, Deserialize)]
struct KrakenTickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, Value>,
}

fn number(value: &Value, what: &str) -> PollResult<f64> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| PollError::Parse(format!("invalid {what}: {value}")))
}

/// Reduce a Kraken pair name to a comparable form.
///
/// Kraken reports legacy names for older pairs (`XXMRZUSD`, `XXBTZUSD`):
/// an `X`/`Z` class prefix on each four-letter leg and `XBT`/`XDG` codes.
pub fn canonical_kraken_pair(pair: &str) -> String {
    let pair = pair.replace('/', "").to_uppercase();
    let legacy = pair.len() == 8
        && pair.is_ascii()
        && matches!(&pair[0..1], "X" | "Z")
        && matches!(&pair[4..5], "X" | "Z");
    let pair = if legacy {
        format!("{}{}", &pair[1..4], &pair[5..8])
    } else {
        pair
    };
    pair.replace("XBT", "BTC").replace("XDG", "DOGE")
}

/// Decode Binance kline rows `[open_time_ms, "o", "h", "l", "c", ...]`.
pub fn parse_klines(rows: &[Vec<Value>]) -> PollResult<Vec<Candle>> {
    rows.iter()
        .map(|row| {
            if row.len() < 5 {
                return Err(PollError::Parse(format!("short kline row: {row:?}")));
            }
            let open_ms = row[0]
                .as_i64()
                .ok_or_else(|| PollError::Parse(format!("invalid kline open time: {}", row[0])))?;
            let start = DateTime::from_timestamp_millis(open_ms)
                .ok_or_else(|| PollError::Parse(format!("kline time out of range: {open_ms}")))?;
            Candle::from_ohlc(
                start,
                number(&row[1], "open")?,
                number(&row[2], "high")?,
                number(&row[3], "low")?,
                number(&row[4], "close")?,
            )
            .map_err(|e| PollError::Parse(e.to_string()))
        })
        .collect()
}

pub struct Bootstrapper {
    client: HttpClient,
    config: BootstrapConfig,
    store: Arc<Store>,
}

impl Bootstrapper {
    pub fn new(config: BootstrapConfig, store: Arc<Store>) -> PollResult<Self> {
        Ok(Self {
            client: HttpClient::new(config.request_timeout)?,
            config,
            store,
        })
    }

    fn binance_url(&self, path: &str) -> String {
        format!("{}{}", self.config.binance_base_url.trim_end_matches('/'), path)
    }

    /// Seed one Binance symbol's price from the 24h ticker.
    pub async fn binance_ticker(&self, key: &str) -> PollResult<()> {
        let symbol = key.to_uppercase();
        let ticker: Ticker24h = self
            .client
            .get_json(&self.binance_url("/api/v3/ticker/24hr"), &[("symbol", symbol.as_str())])
            .await?;
        let price = number(&Value::String(ticker.last_price), "lastPrice")?;
        let change = number(&Value::String(ticker.price_change_percent), "priceChangePercent")?;
        self.store
            .upsert_from_source(TickerSource::Binance, key, price, change, true);
        Ok(())
    }

    /// Seed one Binance symbol's candle history from klines.
    pub async fn binance_klines(&self, key: &str) -> PollResult<usize> {
        let symbol = key.to_uppercase();
        let limit = self.config.kline_limit.to_string();
        let rows: Vec<Vec<Value>> = self
            .client
            .get_json(
                &self.binance_url("/api/v3/klines"),
                &[
                    ("symbol", symbol.as_str()),
                    ("interval", self.config.kline_interval.as_str()),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        let bars = parse_klines(&rows)?;
        let count = bars.len();
        self.store.bootstrap_candles(key, bars);
        Ok(count)
    }

    /// Seed Kraken prices. Kraken's REST ticker has no 24h change, so it is 0.
    pub async fn kraken_tickers(&self, pairs: &HashMap<String, String>) -> PollResult<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut wanted: Vec<(String, String)> = pairs
            .iter()
            .map(|(key, pair)| (key.clone(), pair.replace('/', "").to_uppercase()))
            .collect();
        wanted.sort();
        let query: Vec<&str> = wanted.iter().map(|(_, p)| p.as_str()).collect();
        let query = query.join(",");

        let url = format!("{}/0/public/Ticker", self.config.kraken_base_url.trim_end_matches('/'));
        let response: KrakenTickerResponse =
            self.client.get_json(&url, &[("pair", query.as_str())]).await?;
        if !response.error.is_empty() {
            return Err(PollError::Parse(response.error.join("; ")));
        }

        let mut applied = 0;
        for (api_pair, data) in &response.result {
            let reported = canonical_kraken_pair(api_pair);
            let matched = wanted
                .iter()
                .find(|(_, p)| canonical_kraken_pair(p) == reported)
                .or_else(|| (wanted.len() == 1 && response.result.len() == 1).then(|| &wanted[0]));
            let Some((key, _)) = matched else {
                debug!(pair = %api_pair, "Kraken pair not requested");
                continue;
            };
            let price = match number(&data["c"][0], "c") {
                Ok(price) => price,
                Err(e) => {
                    warn!(pair = %api_pair, error = %e, "Skipping malformed Kraken ticker");
                    continue;
                }
            };
            if self
                .store
                .upsert_from_source(TickerSource::Kraken, key, price, 0.0, true)
            {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Run every bootstrap step. Never fails.
    pub async fn run(&self, main_keys: &[String], kraken_pairs: &HashMap<String, String>) {
        let binance_keys = self.store.keys_for_source(TickerSource::Binance);
        info!(symbols = binance_keys.len(), "Bootstrapping Binance tickers");

        stream::iter(binance_keys.iter())
            .for_each_concurrent(self.config.concurrency.max(1), |key| async move {
                if let Err(e) = self.binance_ticker(key).await {
                    Metrics::poll_failure(POLLER, e.kind());
                    warn!(%key, error = %e, "Binance ticker bootstrap failed");
                    return;
                }
                if main_keys.contains(key) {
                    match self.binance_klines(key).await {
                        Ok(bars) => info!(%key, bars, "Candle history loaded"),
                        Err(e) => {
                            Metrics::poll_failure(POLLER, e.kind());
                            warn!(%key, error = %e, "Kline bootstrap failed");
                        }
                    }
                }
            })
            .await;

        let kraken: HashMap<String, String> = kraken_pairs
            .iter()
            .filter(|(key, _)| self.store.source_of(key) == Some(TickerSource::Kraken))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        match self.kraken_tickers(&kraken).await {
            Ok(n) => info!(applied = n, "Kraken bootstrap complete"),
            Err(e) => {
                Metrics::poll_failure(POLLER, e.kind());
                warn!(error = %e, "Kraken bootstrap failed");
            }
        }
    }
}
