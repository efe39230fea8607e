//! Dashboard state management.
//!
//! `DashboardState` reads the store once per tick and keeps the little view
//! state the display needs between frames: which main symbol is showing and
//! the cached marquee.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use kiosk_core::symbol_key;
use kiosk_feed::Store;
use kiosk_health::HealthAggregator;
use tracing::{debug, trace};

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::format::{
    display_name, format_change, format_difficulty, format_hashrate, format_network_hashrate,
    format_price, price_decimals,
};
use crate::types::{Frame, MainBody, MainPanel, MarqueeEntry, MinerColor, NetworkLine, TopRight};

const BITCOIN_KEY: &str = "btcusdt";
const LOADING_NETWORK: &str = "Loading network data…";

pub struct DashboardState {
    store: Arc<Store>,
    health: HealthAggregator,
    config: DashboardConfig,
    main_keys: Vec<String>,
    /// `(key, display name)` in configured order.
    marquee_keys: Vec<(String, String)>,
    main_index: usize,
    last_switch: Option<DateTime<Utc>>,
    marquee: Vec<MarqueeEntry>,
    last_marquee_build: Option<DateTime<Utc>>,
    /// `last_published_price` per marquee key at the last rebuild.
    published: HashMap<String, Option<f64>>,
}

impl DashboardState {
    pub fn new(
        store: Arc<Store>,
        health: HealthAggregator,
        config: DashboardConfig,
    ) -> DashboardResult<Self> {
        config.validate()?;
        let key = |s: &String| symbol_key(s).map_err(|e| DashboardError::InvalidConfig(e.to_string()));

        let main_keys = config.main_symbols.iter().map(key).collect::<DashboardResult<Vec<_>>>()?;
        let marquee_keys = config
            .marquee_symbols
            .iter()
            .map(|s| Ok((key(s)?, display_name(s))))
            .collect::<DashboardResult<Vec<_>>>()?;

        Ok(Self {
            store,
            health,
            config,
            main_keys,
            marquee_keys,
            main_index: 0,
            last_switch: None,
            marquee: Vec::new(),
            last_marquee_build: None,
            published: HashMap::new(),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Key of the main symbol currently on screen.
    pub fn current_main_key(&self) -> Option<&str> {
        self.main_keys.get(self.main_index).map(String::as_str)
    }

    /// Collect one frame as of `now`.
    pub fn collect_frame(&mut self, now: DateTime<Utc>) -> Frame {
        self.rotate(now);
        self.refresh_marquee(now);

        let main_key = self.current_main_key().map(str::to_string);
        let main = main_key.as_deref().map(|key| self.main_panel(key, now));
        let network = match main_key.as_deref() {
            Some(BITCOIN_KEY) => Some(self.network_line()),
            _ => None,
        };

        let miners = self.store.get_miner_aggregate();
        let (top_right, hash_history) = if miners.has_miners() {
            let color = if miners.all_healthy() {
                MinerColor::AllActive
            } else if miners.connected_count > 0 {
                MinerColor::Partial
            } else {
                MinerColor::Offline
            };
            let text = format!(
                "{} - {}",
                format_hashrate(miners.total_hashrate),
                format_difficulty(miners.best_difficulty)
            );
            (TopRight::Miners { text, color }, self.store.get_hash_history())
        } else {
            let text = now.with_timezone(&Local).format("%H:%M").to_string();
            (TopRight::Clock { text }, Vec::new())
        };

        Frame {
            timestamp_ms: now.timestamp_millis(),
            main,
            top_right,
            network,
            marquee: self.marquee.clone(),
            hash_history,
            health: self.health.connection_health(),
        }
    }

    fn rotate(&mut self, now: DateTime<Utc>) {
        let Some(last) = self.last_switch else {
            self.last_switch = Some(now);
            return;
        };
        if self.main_keys.len() <= 1 {
            return;
        }
        let period = Duration::seconds(self.config.rotation_secs as i64);
        if now - last >= period {
            self.main_index = (self.main_index + 1) % self.main_keys.len();
            self.last_switch = Some(now);
            debug!(symbol = ?self.current_main_key(), "Main symbol rotated");
        }
    }

    fn refresh_marquee(&mut self, now: DateTime<Utc>) {
        let tickers: Vec<_> = self
            .marquee_keys
            .iter()
            .map(|(key, _)| self.store.get_ticker(key))
            .collect();

        let interval = Duration::milliseconds((self.config.marquee_refresh_secs * 1000.0) as i64);
        let due = self
            .last_marquee_build
            .map_or(true, |last| now - last >= interval);
        let changed = self
            .marquee_keys
            .iter()
            .zip(&tickers)
            .any(|((key, _), ticker)| {
                let current = ticker.as_ref().and_then(|t| t.last_published_price);
                self.published.get(key).copied().flatten() != current
            });
        if !due && !changed {
            return;
        }

        let timeout = Duration::seconds(self.config.data_timeout_secs as i64);
        self.marquee = self
            .marquee_keys
            .iter()
            .zip(&tickers)
            .map(|((key, name), ticker)| {
                let priced = ticker
                    .as_ref()
                    .and_then(|t| t.fresh_price(now, timeout).map(|p| (p, t.change_24h)));
                match priced {
                    Some((price, change)) => {
                        let decimals = price_decimals(key, price, &self.config.price_decimals);
                        MarqueeEntry {
                            name: name.clone(),
                            price_text: Some(format!("${}", format_price(price, decimals))),
                            change_up: change >= 0.0,
                        }
                    }
                    None => MarqueeEntry {
                        name: name.clone(),
                        price_text: None,
                        change_up: true,
                    },
                }
            })
            .collect();
        self.published = self
            .marquee_keys
            .iter()
            .zip(&tickers)
            .map(|((key, _), ticker)| (key.clone(), ticker.as_ref().and_then(|t| t.last_published_price)))
            .collect();
        self.last_marquee_build = Some(now);
        trace!(entries = self.marquee.len(), changed, "Marquee rebuilt");
    }

    fn main_panel(&self, key: &str, now: DateTime<Utc>) -> MainPanel {
        let timeout = Duration::seconds(self.config.data_timeout_secs as i64);
        let ticker = self.store.get_ticker(key);

        let body = match ticker.as_ref().and_then(|t| t.fresh_price(now, timeout).map(|p| (t, p))) {
            Some((ticker, price)) => {
                let decimals = price_decimals(key, price, &self.config.price_decimals);
                MainBody::Price {
                    price_text: format!("${}", format_price(price, decimals)),
                    change_text: format_change(ticker.change_24h),
                    change_up: ticker.change_24h >= 0.0,
                    candles: ticker.chart_candles(),
                }
            }
            None => MainBody::Placeholder {
                status_text: ticker
                    .as_ref()
                    .map_or("No data", |t| t.status.label())
                    .to_string(),
            },
        };

        MainPanel {
            key: key.to_string(),
            display_name: display_name(key),
            body,
        }
    }

    fn network_line(&self) -> NetworkLine {
        let stats = self.store.get_network_stats();
        let (Some(fee), Some(height)) = (stats.fee_rate, stats.block_height) else {
            return NetworkLine {
                text: LOADING_NETWORK.to_string(),
                loaded: false,
            };
        };

        let mut parts = vec![format!("{fee:.1} sat/vB"), height.to_string()];
        if let Some(pool) = stats.mining_pool.filter(|p| !p.is_empty()) {
            parts.push(pool);
        }
        if let Some(hashrate) = stats.network_hashrate {
            parts.push(format_network_hashrate(hashrate));
        }
        if let Some(difficulty) = stats.network_difficulty {
            parts.push(format_difficulty(difficulty));
        }
        NetworkLine {
            text: parts.join(" | "),
            loaded: true,
        }
    }
}
