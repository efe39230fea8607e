//! Per-symbol ticker data.
//!
//! A `TickerRecord` is created once per configured symbol at startup and
//! mutated only through the shared store. Readers always receive clones.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Upstream provider responsible for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerSource {
    /// Binance WebSocket stream.
    Binance,
    /// Kraken WebSocket stream.
    Kraken,
    /// CoinGecko REST polling.
    CoinGecko,
}

impl std::fmt::Display for TickerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "binance"),
            Self::Kraken => write!(f, "kraken"),
            Self::CoinGecko => write!(f, "coingecko"),
        }
    }
}

/// Feed status, shared by streaming drivers and ticker records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeedStatus {
    /// Driver has not started yet.
    Disconnected,
    /// Transport is being opened.
    #[default]
    Connecting,
    /// Data is flowing.
    Live,
    /// Last attempt failed.
    Error,
    /// Waiting out the backoff before the next attempt.
    Reconnecting,
}

impl FeedStatus {
    /// Label shown in placeholder state.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting…",
            Self::Live => "Live",
            Self::Error => "Error",
            Self::Reconnecting => "Reconnecting…",
        }
    }
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse connection health for the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionHealth {
    /// Network reachable and both streams ok.
    Healthy,
    /// Network reachable and exactly one stream ok.
    Degraded,
    /// Network unreachable or no stream ok.
    Critical,
}

impl std::fmt::Display for ConnectionHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One OHLC bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start (aligned to the bucket width).
    pub start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Open a bucket from a single sample.
    pub fn from_sample(start: DateTime<Utc>, price: f64) -> Self {
        Self {
            start,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    /// Build a candle from upstream OHLC values, rejecting inconsistent bars.
    pub fn from_ohlc(start: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Result<Self> {
        let values = [open, high, low, close];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::InvalidCandle(format!(
                "non-finite value at {start}"
            )));
        }
        if high < open.max(close) || low > open.min(close) {
            return Err(CoreError::InvalidCandle(format!(
                "inconsistent OHLC at {start}: o={open} h={high} l={low} c={close}"
            )));
        }
        Ok(Self {
            start,
            open,
            high,
            low,
            close,
        })
    }

    /// Widen the bucket with a new price. `open` never changes.
    pub fn extend(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    /// Close at or above open.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Check the OHLC invariant.
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}

/// Per-symbol market data container.
#[derive(Debug, Clone, Serialize)]
pub struct TickerRecord {
    /// Last price, absent until the first update.
    pub price: Option<f64>,
    /// 24h change in percent.
    pub change_24h: f64,
    pub status: FeedStatus,
    /// Time of the last price update.
    pub last_update: Option<DateTime<Utc>>,
    pub source: TickerSource,
    /// Closed buckets, oldest first. Never contains the open bucket.
    pub closed_candles: VecDeque<Candle>,
    /// In-progress bucket.
    pub open_candle: Option<Candle>,
    /// Price last flagged for publication to the marquee.
    pub last_published_price: Option<f64>,
}

impl TickerRecord {
    /// Create an empty record for a source.
    pub fn new(source: TickerSource) -> Self {
        Self {
            price: None,
            change_24h: 0.0,
            status: FeedStatus::Connecting,
            last_update: None,
            source,
            closed_candles: VecDeque::new(),
            open_candle: None,
            last_published_price: None,
        }
    }

    /// Age of the last update.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_update.map(|t| now - t)
    }

    /// A record is fresh when it has a price updated within `timeout`.
    pub fn is_fresh(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.price.is_some() && self.age(now).is_some_and(|age| age < timeout)
    }

    /// Price, treating stale data as absent.
    pub fn fresh_price(&self, now: DateTime<Utc>, timeout: Duration) -> Option<f64> {
        if self.is_fresh(now, timeout) {
            self.price
        } else {
            None
        }
    }

    /// Closed candles followed by the open one, for charting.
    pub fn chart_candles(&self) -> Vec<Candle> {
        let mut candles: Vec<Candle> = self.closed_candles.iter().copied().collect();
        if let Some(open) = self.open_candle {
            candles.push(open);
        }
        candles
    }
}

/// Normalize a configured symbol into its store key.
pub fn symbol_key(symbol: &str) -> Result<String> {
    let key = symbol.trim().to_lowercase();
    if key.is_empty() {
        return Err(CoreError::InvalidSymbol(symbol.to_string()));
    }
    Ok(key)
}
