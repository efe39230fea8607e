//! Application configuration.
//!
//! The file keeps the flat layout of the kiosk's `config.json`; every field
//! has a default so a partial (or missing) file still yields a usable config.

use crate::error::{AppError, AppResult};
use kiosk_core::{symbol_key, TickerSource};
use kiosk_dashboard::DashboardConfig;
use kiosk_feed::StoreConfig;
use kiosk_health::HealthConfig;
use kiosk_poll::{BootstrapConfig, CoinGeckoConfig, MempoolConfig, MinerPollerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Upstream endpoints. Overridable for testing against local servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_binance_ws")]
    pub binance_ws: String,
    #[serde(default = "default_kraken_ws")]
    pub kraken_ws: String,
    #[serde(default = "default_binance_rest")]
    pub binance_rest: String,
    #[serde(default = "default_kraken_rest")]
    pub kraken_rest: String,
    #[serde(default = "default_coingecko")]
    pub coingecko: String,
    #[serde(default = "default_mempool")]
    pub mempool: String,
}

fn default_binance_ws() -> String {
    kiosk_ws::binance::BINANCE_WS_BASE.to_string()
}
fn default_kraken_ws() -> String {
    kiosk_ws::kraken::KRAKEN_WS_URL.to_string()
}
fn default_binance_rest() -> String {
    kiosk_poll::bootstrap::BINANCE_REST.to_string()
}
fn default_kraken_rest() -> String {
    kiosk_poll::bootstrap::KRAKEN_REST.to_string()
}
fn default_coingecko() -> String {
    kiosk_poll::coingecko::COINGECKO_API.to_string()
}
fn default_mempool() -> String {
    kiosk_poll::mempool::MEMPOOL_API.to_string()
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            binance_ws: default_binance_ws(),
            kraken_ws: default_kraken_ws(),
            binance_rest: default_binance_rest(),
            kraken_rest: default_kraken_rest(),
            coingecko: default_coingecko(),
            mempool: default_mempool(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Candle bucket width in seconds.
    #[serde(default = "default_candle_seconds")]
    pub candle_seconds: u64,
    /// Closed candles kept per symbol; also the hash history length.
    #[serde(default = "default_max_candles")]
    pub max_candles: usize,
    #[serde(default = "default_main_symbols")]
    pub main_symbols: Vec<String>,
    #[serde(default = "default_marquee_symbols")]
    pub marquee_symbols: Vec<String>,
    #[serde(default = "default_price_decimals")]
    pub price_decimals: HashMap<String, usize>,
    /// Store key → Kraken pair (`XMR/USDT`).
    #[serde(default = "default_kraken_pairs")]
    pub kraken_pairs: HashMap<String, String>,
    /// Store key → CoinGecko coin id.
    #[serde(default = "default_coingecko_ids")]
    pub coingecko_ids: HashMap<String, String>,
    /// TH/s above which a miner counts as active.
    #[serde(default = "default_miner_active_threshold")]
    pub miner_active_threshold: f64,
    /// Seconds after which a price renders as stale.
    #[serde(default = "default_data_timeout")]
    pub data_timeout: u64,
    /// Seconds between connectivity probes.
    #[serde(default = "default_wifi_check_interval")]
    pub wifi_check_interval: f64,
    #[serde(default)]
    pub miners_ips: Vec<String>,
    #[serde(default = "default_marquee_refresh_interval")]
    pub marquee_refresh_interval: f64,
    /// Append frames as JSON lines here instead of logging them.
    #[serde(default)]
    pub frame_log_path: Option<String>,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

fn default_fps() -> u32 {
    25
}
fn default_candle_seconds() -> u64 {
    60
}
fn default_max_candles() -> usize {
    14
}
fn default_main_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string()]
}
fn default_marquee_symbols() -> Vec<String> {
    [
        "ETHUSDT", "BNBUSDT", "XMRUSDT", "SOLUSDT", "LTCUSDT", "XRPUSDT", "ADAUSDT", "TRXUSDT",
        "MEUSDT", "HBARUSDT", "ESXUSD", "XECUSDT", "RUNECOIN",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_price_decimals() -> HashMap<String, usize> {
    [("xecusdt", 8), ("xecusdc", 8), ("esxusd", 6), ("runecoin", 8)]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
}
fn default_kraken_pairs() -> HashMap<String, String> {
    [("xmrusdt", "XMR/USDT"), ("esxusd", "ESX/USD")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
fn default_coingecko_ids() -> HashMap<String, String> {
    HashMap::from([("runecoin".to_string(), "runecoin".to_string())])
}
fn default_miner_active_threshold() -> f64 {
    0.25
}
fn default_data_timeout() -> u64 {
    300
}
/// Upper bound for second-valued float intervals (one day).
const MAX_INTERVAL_SECS: f64 = 86_400.0;

fn interval_in_range(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_INTERVAL_SECS
}

fn default_wifi_check_interval() -> f64 {
    12.0
}
fn default_marquee_refresh_interval() -> f64 {
    8.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            candle_seconds: default_candle_seconds(),
            max_candles: default_max_candles(),
            main_symbols: default_main_symbols(),
            marquee_symbols: default_marquee_symbols(),
            price_decimals: default_price_decimals(),
            kraken_pairs: default_kraken_pairs(),
            coingecko_ids: default_coingecko_ids(),
            miner_active_threshold: default_miner_active_threshold(),
            data_timeout: default_data_timeout(),
            wifi_check_interval: default_wifi_check_interval(),
            miners_ips: Vec::new(),
            marquee_refresh_interval: default_marquee_refresh_interval(),
            frame_log_path: None,
            endpoints: EndpointsConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a file: JSON for `.json`, TOML otherwise.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let is_json = Path::new(path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?
        } else {
            toml::from_str(&content)
                .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?
        };
        config.validate()?;
        Ok(config.normalized())
    }

    /// Load from a file, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path, error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.fps == 0 {
            return Err(AppError::Config("fps must be positive".to_string()));
        }
        if self.candle_seconds == 0 || self.max_candles == 0 {
            return Err(AppError::Config(
                "candle_seconds and max_candles must be positive".to_string(),
            ));
        }
        if self.main_symbols.is_empty() {
            return Err(AppError::Config("main_symbols must not be empty".to_string()));
        }
        for symbol in self.main_symbols.iter().chain(&self.marquee_symbols) {
            symbol_key(symbol).map_err(|e| AppError::Config(e.to_string()))?;
        }
        if !interval_in_range(self.wifi_check_interval) {
            return Err(AppError::Config(format!(
                "wifi_check_interval must be in (0, {MAX_INTERVAL_SECS}]"
            )));
        }
        if !interval_in_range(self.marquee_refresh_interval) {
            return Err(AppError::Config(format!(
                "marquee_refresh_interval must be in (0, {MAX_INTERVAL_SECS}]"
            )));
        }
        Ok(())
    }

    /// Lowercase the keys of every per-symbol map.
    fn normalized(mut self) -> Self {
        let lower = |m: HashMap<String, String>| -> HashMap<String, String> {
            m.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()
        };
        self.kraken_pairs = lower(self.kraken_pairs);
        self.coingecko_ids = lower(self.coingecko_ids);
        self.price_decimals = self
            .price_decimals
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        self
    }

    /// Store keys of every configured symbol, main first, without duplicates.
    pub fn symbol_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for symbol in self.main_symbols.iter().chain(&self.marquee_symbols) {
            if let Ok(key) = symbol_key(symbol) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    pub fn main_keys(&self) -> Vec<String> {
        self.main_symbols
            .iter()
            .filter_map(|s| symbol_key(s).ok())
            .collect()
    }

    /// Kraken if the key has a Kraken pair, CoinGecko if it has a coin id,
    /// Binance otherwise.
    pub fn source_for(&self, key: &str) -> TickerSource {
        if self.kraken_pairs.contains_key(key) {
            TickerSource::Kraken
        } else if self.coingecko_ids.contains_key(key) {
            TickerSource::CoinGecko
        } else {
            TickerSource::Binance
        }
    }

    /// Kraken pairs for configured symbols only.
    pub fn active_kraken_pairs(&self) -> HashMap<String, String> {
        let keys = self.symbol_keys();
        self.kraken_pairs
            .iter()
            .filter(|(k, _)| keys.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// CoinGecko ids for configured, CoinGecko-sourced symbols only.
    pub fn active_coingecko_ids(&self) -> HashMap<String, String> {
        let keys = self.symbol_keys();
        self.coingecko_ids
            .iter()
            .filter(|(k, _)| keys.contains(k) && self.source_for(k) == TickerSource::CoinGecko)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            candle_seconds: self.candle_seconds,
            max_candles: self.max_candles,
            hash_history_len: self.max_candles,
            total_miners: self.miners_ips.len(),
        }
    }

    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            fps: self.fps,
            main_symbols: self.main_symbols.clone(),
            marquee_symbols: self.marquee_symbols.clone(),
            price_decimals: self.price_decimals.clone(),
            data_timeout_secs: self.data_timeout,
            marquee_refresh_secs: self.marquee_refresh_interval,
            frame_log_path: self.frame_log_path.clone(),
            ..DashboardConfig::default()
        }
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            binance_base_url: self.endpoints.binance_rest.clone(),
            kraken_base_url: self.endpoints.kraken_rest.clone(),
            ..BootstrapConfig::default()
        }
        .with_candles(self.candle_seconds, self.max_candles)
    }

    pub fn coingecko_config(&self) -> CoinGeckoConfig {
        CoinGeckoConfig {
            base_url: self.endpoints.coingecko.clone(),
            ids: self.active_coingecko_ids(),
            ..CoinGeckoConfig::default()
        }
    }

    pub fn mempool_config(&self) -> MempoolConfig {
        MempoolConfig {
            base_url: self.endpoints.mempool.clone(),
            ..MempoolConfig::default()
        }
    }

    pub fn miner_config(&self) -> MinerPollerConfig {
        MinerPollerConfig {
            endpoints: self.miners_ips.clone(),
            active_threshold: self.miner_active_threshold,
            ..MinerPollerConfig::default()
        }
    }

    pub fn connectivity_interval(&self) -> Duration {
        Duration::from_secs_f64(self.wifi_check_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("{}-{name}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.fps, 25);
        assert_eq!(config.candle_seconds, 60);
        assert_eq!(config.max_candles, 14);
        assert_eq!(config.main_symbols, vec!["BTCUSDT"]);
        assert_eq!(config.marquee_symbols.len(), 13);
        assert_eq!(config.price_decimals.get("esxusd"), Some(&6));
        assert_eq!(config.data_timeout, 300);
        assert_eq!(config.wifi_check_interval, 12.0);
        assert!(config.miners_ips.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_file() {
        let path = write_temp(
            "partial.json",
            r#"{"fps": 10, "main_symbols": ["BTCUSDT", "ETHUSDT"], "miners_ips": ["192.168.1.50"],
                "kraken_pairs": {"XMRUSDT": "XMR/USDT"}}"#,
        );
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.fps, 10);
        assert_eq!(config.main_symbols.len(), 2);
        assert_eq!(config.store_config().total_miners, 1);
        assert_eq!(config.kraken_pairs.get("xmrusdt").map(String::as_str), Some("XMR/USDT"));
        assert_eq!(config.max_candles, 14);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_toml_file() {
        let path = write_temp(
            "kiosk.toml",
            r#"
fps = 5
marquee_symbols = ["SOLUSDT"]

[endpoints]
mempool = "http://127.0.0.1:9999"

wifi_check_interval = 30.0

[health]
probe_timeout_ms = 1000
"#,
        );
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.fps, 5);
        assert_eq!(config.marquee_symbols, vec!["SOLUSDT"]);
        assert_eq!(config.endpoints.mempool, "http://127.0.0.1:9999");
        assert_eq!(config.endpoints.coingecko, default_coingecko());
        assert_eq!(config.connectivity_interval(), Duration::from_secs(30));
        assert_eq!(config.health.probe_timeout_ms, 1000);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_invalid_or_missing_falls_back() {
        let path = write_temp("broken.json", "{ not json");
        assert!(AppConfig::from_file(&path).is_err());
        assert_eq!(AppConfig::load_or_default(&path).fps, 25);
        let _ = std::fs::remove_file(path);

        assert_eq!(AppConfig::load_or_default("/nonexistent/config.json").fps, 25);
    }

    #[test]
    fn test_validation_failure_falls_back() {
        let path = write_temp("zero.json", r#"{"fps": 0}"#);
        assert!(AppConfig::from_file(&path).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_source_assignment() {
        let config = AppConfig::default();
        assert_eq!(config.source_for("xmrusdt"), TickerSource::Kraken);
        assert_eq!(config.source_for("esxusd"), TickerSource::Kraken);
        assert_eq!(config.source_for("runecoin"), TickerSource::CoinGecko);
        assert_eq!(config.source_for("btcusdt"), TickerSource::Binance);
        assert_eq!(config.source_for("ethusdt"), TickerSource::Binance);
    }

    #[test]
    fn test_symbol_keys_dedupe() {
        let config = AppConfig {
            main_symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            marquee_symbols: vec!["ethusdt".to_string(), "XMRUSDT".to_string()],
            ..AppConfig::default()
        };
        assert_eq!(config.symbol_keys(), vec!["btcusdt", "ethusdt", "xmrusdt"]);
        assert_eq!(config.main_keys(), vec!["btcusdt", "ethusdt"]);
    }

    #[test]
    fn test_active_maps_follow_configured_symbols() {
        let config = AppConfig {
            marquee_symbols: vec!["XMRUSDT".to_string()],
            ..AppConfig::default()
        };
        let kraken = config.active_kraken_pairs();
        assert_eq!(kraken.len(), 1);
        assert!(kraken.contains_key("xmrusdt"));
        assert!(config.active_coingecko_ids().is_empty());
    }

    #[test]
    fn test_intervals_are_bounded() {
        for bad in [0.0, -1.0, f64::NAN, 1e300] {
            let config = AppConfig {
                wifi_check_interval: bad,
                ..AppConfig::default()
            };
            assert!(config.validate().is_err(), "wifi_check_interval {bad} accepted");
            let config = AppConfig {
                marquee_refresh_interval: bad,
                ..AppConfig::default()
            };
            assert!(config.validate().is_err(), "marquee_refresh_interval {bad} accepted");
        }
        let config = AppConfig {
            wifi_check_interval: MAX_INTERVAL_SECS,
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bootstrap_klines_follow_candle_width() {
        let config = AppConfig {
            candle_seconds: 300,
            ..AppConfig::default()
        };
        let bootstrap = config.bootstrap_config();
        assert_eq!(bootstrap.kline_interval, "5m");
        assert_eq!(bootstrap.kline_limit, 15);
        assert_eq!(AppConfig::default().bootstrap_config().kline_interval, "1m");
    }
}
