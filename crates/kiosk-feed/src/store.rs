//! Shared state store.
//!
//! Holds one `TickerRecord` per registered symbol, the miner aggregate,
//! the rolling hash-rate history and the Bitcoin network statistics.
//! Each of the four lives behind its own lock; no lock is ever held
//! across I/O or across another domain's lock.

use crate::candle::CandleAggregator;
use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kiosk_core::{Candle, FeedStatus, MinerAggregate, NetworkStats, TickerRecord, TickerSource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Store sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Candle bucket width in seconds.
    pub candle_seconds: u64,
    /// Closed candles kept per symbol.
    pub max_candles: usize,
    /// Samples kept in the hash-rate history.
    pub hash_history_len: usize,
    /// Number of configured miner endpoints.
    pub total_miners: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            candle_seconds: 60,
            max_candles: 14,
            hash_history_len: 14,
            total_miners: 0,
        }
    }
}

type TickerEntry = Arc<RwLock<TickerRecord>>;

fn is_valid_sample(key: &str, price: f64, change_24h: f64) -> bool {
    if price.is_finite() && change_24h.is_finite() {
        return true;
    }
    warn!(key = %key, price, change_24h, "Dropping non-finite update");
    false
}

/// Thread-safe store shared by every feed driver and the dashboard.
pub struct Store {
    tickers: DashMap<String, TickerEntry>,
    candles: CandleAggregator,
    miners: RwLock<MinerAggregate>,
    hash_history: RwLock<VecDeque<f64>>,
    hash_history_len: usize,
    network: RwLock<NetworkStats>,
}

impl Store {
    pub fn new(config: StoreConfig) -> FeedResult<Self> {
        if config.hash_history_len == 0 {
            return Err(FeedError::InvalidConfig(
                "hash history length must be positive".to_string(),
            ));
        }
        Ok(Self {
            tickers: DashMap::new(),
            candles: CandleAggregator::new(config.candle_seconds, config.max_candles)?,
            miners: RwLock::new(MinerAggregate::empty(config.total_miners)),
            hash_history: RwLock::new(VecDeque::with_capacity(config.hash_history_len)),
            hash_history_len: config.hash_history_len,
            network: RwLock::new(NetworkStats::default()),
        })
    }

    // ---------------------------------------------------------------
    // Tickers
    // ---------------------------------------------------------------

    /// Register a symbol. Keys are fixed for the life of the store.
    pub fn register_ticker(&self, key: &str, source: TickerSource) -> FeedResult<()> {
        let key = kiosk_core::symbol_key(key)?;
        if self.tickers.contains_key(&key) {
            return Err(FeedError::DuplicateSymbol(key));
        }
        debug!(key = %key, source = %source, "Registered ticker");
        self.tickers
            .insert(key, Arc::new(RwLock::new(TickerRecord::new(source))));
        Ok(())
    }

    fn entry(&self, key: &str) -> Option<TickerEntry> {
        self.tickers.get(key).map(|e| e.value().clone())
    }

    /// Record a price update at the current time.
    ///
    /// Returns `false` if the key was never registered or the values are not finite.
    pub fn upsert_ticker(&self, key: &str, price: f64, change_24h: f64, update_published: bool) -> bool {
        self.upsert_ticker_at(key, price, change_24h, update_published, Utc::now())
    }

    /// Record a price update at an explicit time.
    pub fn upsert_ticker_at(
        &self,
        key: &str,
        price: f64,
        change_24h: f64,
        update_published: bool,
        at: DateTime<Utc>,
    ) -> bool {
        if !is_valid_sample(key, price, change_24h) {
            return false;
        }
        let Some(entry) = self.entry(key) else {
            trace!(key = %key, "Ignoring update for unknown symbol");
            return false;
        };
        let mut record = entry.write();
        self.apply_update(&mut record, price, change_24h, update_published, at);
        true
    }

    /// Record a price update only if the symbol belongs to `source`.
    pub fn upsert_from_source(
        &self,
        source: TickerSource,
        key: &str,
        price: f64,
        change_24h: f64,
        update_published: bool,
    ) -> bool {
        if !is_valid_sample(key, price, change_24h) {
            return false;
        }
        let Some(entry) = self.entry(key) else {
            return false;
        };
        let mut record = entry.write();
        if record.source != source {
            trace!(key = %key, source = %source, owner = %record.source, "Ignoring update from non-owning source");
            return false;
        }
        self.apply_update(&mut record, price, change_24h, update_published, Utc::now());
        true
    }

    fn apply_update(
        &self,
        record: &mut TickerRecord,
        price: f64,
        change_24h: f64,
        update_published: bool,
        at: DateTime<Utc>,
    ) {
        record.price = Some(price);
        record.change_24h = change_24h;
        record.status = FeedStatus::Live;
        record.last_update = Some(at);
        if update_published {
            record.last_published_price = Some(price);
        }
        let TickerRecord {
            closed_candles,
            open_candle,
            ..
        } = record;
        self.candles.apply(closed_candles, open_candle, at, price);
    }

    /// Replace a symbol's candle history with upstream bars (oldest first).
    pub fn bootstrap_candles(&self, key: &str, bars: Vec<Candle>) -> bool {
        let Some(entry) = self.entry(key) else {
            return false;
        };
        let count = bars.len();
        let mut record = entry.write();
        let TickerRecord {
            closed_candles,
            open_candle,
            ..
        } = &mut *record;
        self.candles.bootstrap(closed_candles, open_candle, bars);
        debug!(key = %key, bars = count, "Bootstrapped candles");
        true
    }

    /// Mirror a driver status onto every ticker the source owns.
    ///
    /// `Live` is not mirrored; tickers become live on their first update.
    pub fn set_source_status(&self, source: TickerSource, status: FeedStatus) {
        if status == FeedStatus::Live {
            return;
        }
        for item in self.tickers.iter() {
            let mut record = item.value().write();
            if record.source == source {
                record.status = status;
            }
        }
    }

    /// Clone of a ticker record.
    pub fn get_ticker(&self, key: &str) -> Option<TickerRecord> {
        self.entry(key).map(|e| e.read().clone())
    }

    /// Owning source of a symbol.
    pub fn source_of(&self, key: &str) -> Option<TickerSource> {
        self.entry(key).map(|e| e.read().source)
    }

    /// Keys owned by a source, sorted.
    pub fn keys_for_source(&self, source: TickerSource) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tickers
            .iter()
            .filter(|item| item.value().read().source == source)
            .map(|item| item.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// All registered keys, sorted.
    pub fn ticker_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tickers.iter().map(|item| item.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn ticker_count(&self) -> usize {
        self.tickers.len()
    }

    // ---------------------------------------------------------------
    // Miners
    // ---------------------------------------------------------------

    /// Replace the miner aggregate. `total_configured` is fixed at construction.
    pub fn replace_miner_aggregate(&self, aggregate: MinerAggregate) {
        let mut current = self.miners.write();
        let total_configured = current.total_configured;
        *current = MinerAggregate {
            total_configured,
            ..aggregate
        };
    }

    pub fn get_miner_aggregate(&self) -> MinerAggregate {
        *self.miners.read()
    }

    /// Append one hash-rate sample, evicting the oldest at capacity.
    pub fn append_hash_sample(&self, hashrate: f64) {
        let mut history = self.hash_history.write();
        history.push_back(hashrate);
        while history.len() > self.hash_history_len {
            history.pop_front();
        }
    }

    pub fn get_hash_history(&self) -> Vec<f64> {
        self.hash_history.read().iter().copied().collect()
    }

    /// Publish one completed miner poll cycle.
    pub fn record_miner_cycle(&self, aggregate: MinerAggregate) {
        let total = aggregate.total_hashrate;
        self.replace_miner_aggregate(aggregate);
        self.append_hash_sample(total);
    }

    // ---------------------------------------------------------------
    // Network
    // ---------------------------------------------------------------

    pub fn replace_network_stats(&self, stats: NetworkStats) {
        *self.network.write() = stats;
    }

    /// Reset every network field to absent.
    pub fn clear_network_stats(&self) {
        self.replace_network_stats(NetworkStats::default());
    }

    pub fn get_network_stats(&self) -> NetworkStats {
        self.network.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::MinerReading;
    use std::thread;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn store() -> Store {
        Store::new(StoreConfig {
            total_miners: 2,
            ..StoreConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let store = store();
        store.register_ticker("BTCUSDT", TickerSource::Binance).unwrap();
        assert!(matches!(
            store.register_ticker("btcusdt", TickerSource::Kraken),
            Err(FeedError::DuplicateSymbol(_))
        ));
        assert_eq!(store.ticker_count(), 1);
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let store = store();
        assert!(!store.upsert_ticker("dogeusdt", 0.1, 1.0, true));
        assert!(store.get_ticker("dogeusdt").is_none());
    }

    #[test]
    fn test_btcusdt_candle_scenario() {
        let store = store();
        store.register_ticker("btcusdt", TickerSource::Binance).unwrap();

        assert!(store.upsert_ticker_at("btcusdt", 50_000.0, 1.0, false, t(1_700_000_000)));
        assert!(store.upsert_ticker_at("btcusdt", 50_500.0, 1.2, false, t(1_700_000_010)));

        let record = store.get_ticker("btcusdt").unwrap();
        assert_eq!(record.price, Some(50_500.0));
        assert_eq!(record.status, FeedStatus::Live);
        assert!(record.closed_candles.is_empty());
        let open = record.open_candle.unwrap();
        assert_eq!((open.open, open.high, open.low, open.close), (50_000.0, 50_500.0, 50_000.0, 50_500.0));

        store.upsert_ticker_at("btcusdt", 49_900.0, 0.9, false, t(1_700_000_070));
        let record = store.get_ticker("btcusdt").unwrap();
        assert_eq!(record.closed_candles.len(), 1);
        assert_eq!(record.closed_candles[0].close, 50_500.0);
        assert_eq!(record.open_candle.unwrap().open, 49_900.0);
    }

    #[test]
    fn test_non_finite_update_is_dropped() {
        let store = store();
        store.register_ticker("btcusdt", TickerSource::Binance).unwrap();
        store.upsert_ticker_at("btcusdt", 50_000.0, 1.0, true, t(1_700_000_000));

        assert!(!store.upsert_ticker_at("btcusdt", f64::NAN, 1.0, true, t(1_700_000_005)));
        assert!(!store.upsert_ticker("btcusdt", f64::INFINITY, 1.0, true));
        assert!(!store.upsert_ticker("btcusdt", 50_100.0, f64::NAN, true));
        assert!(!store.upsert_from_source(TickerSource::Binance, "btcusdt", f64::NAN, 0.0, true));

        let record = store.get_ticker("btcusdt").unwrap();
        assert_eq!(record.price, Some(50_000.0));
        assert_eq!(record.last_published_price, Some(50_000.0));
        let open = record.open_candle.unwrap();
        assert!(open.is_consistent());
        assert_eq!((open.high, open.low), (50_000.0, 50_000.0));
    }

    #[test]
    fn test_bootstrap_candles_align_to_wider_buckets() {
        let store = Store::new(StoreConfig {
            candle_seconds: 300,
            ..StoreConfig::default()
        })
        .unwrap();
        store.register_ticker("btcusdt", TickerSource::Binance).unwrap();
        let bars: Vec<Candle> = (0..12)
            .map(|i| Candle::from_sample(t(1_700_000_100 + i * 60), 100.0 + i as f64))
            .collect();

        assert!(store.bootstrap_candles("btcusdt", bars));

        let record = store.get_ticker("btcusdt").unwrap();
        let open = record.open_candle.unwrap();
        assert!(record
            .closed_candles
            .iter()
            .chain(Some(&open))
            .all(|c| c.start.timestamp() % 300 == 0));
        assert_eq!(record.closed_candles.len(), 2);
        assert_eq!(open.start, t(1_700_000_700));
        assert_eq!(open.close, 111.0);
    }

    #[test]
    fn test_published_price_only_when_flagged() {
        let store = store();
        store.register_ticker("ethusdt", TickerSource::Binance).unwrap();

        store.upsert_ticker("ethusdt", 3000.0, 0.0, false);
        assert_eq!(store.get_ticker("ethusdt").unwrap().last_published_price, None);

        store.upsert_ticker("ethusdt", 3001.0, 0.0, true);
        assert_eq!(store.get_ticker("ethusdt").unwrap().last_published_price, Some(3001.0));
    }

    #[test]
    fn test_upsert_from_source_checks_owner() {
        let store = store();
        store.register_ticker("xmrusdt", TickerSource::Kraken).unwrap();

        assert!(!store.upsert_from_source(TickerSource::Binance, "xmrusdt", 150.0, 0.0, true));
        assert!(store.upsert_from_source(TickerSource::Kraken, "xmrusdt", 150.0, 0.0, true));
        assert_eq!(store.get_ticker("xmrusdt").unwrap().price, Some(150.0));
    }

    #[test]
    fn test_source_status_mirroring() {
        let store = store();
        store.register_ticker("btcusdt", TickerSource::Binance).unwrap();
        store.register_ticker("xmrusdt", TickerSource::Kraken).unwrap();

        store.set_source_status(TickerSource::Kraken, FeedStatus::Reconnecting);
        assert_eq!(store.get_ticker("xmrusdt").unwrap().status, FeedStatus::Reconnecting);
        assert_eq!(store.get_ticker("btcusdt").unwrap().status, FeedStatus::Connecting);

        store.set_source_status(TickerSource::Kraken, FeedStatus::Live);
        assert_eq!(store.get_ticker("xmrusdt").unwrap().status, FeedStatus::Reconnecting);
        assert_eq!(store.keys_for_source(TickerSource::Kraken), vec!["xmrusdt".to_string()]);
    }

    #[test]
    fn test_miner_cycle_keeps_total_configured() {
        let store = store();
        let readings = [
            MinerReading::online(10.0, 500.0),
            MinerReading::online(5.0, 100.0),
        ];
        let aggregate = MinerAggregate::from_readings(&readings, 0.25, 99);

        store.record_miner_cycle(aggregate);

        let current = store.get_miner_aggregate();
        assert_eq!(current.total_hashrate, 15.0);
        assert_eq!(current.best_difficulty, 500.0);
        assert_eq!(current.total_configured, 2);
        assert_eq!(store.get_hash_history(), vec![15.0]);
    }

    #[test]
    fn test_hash_history_evicts_oldest() {
        let store = Store::new(StoreConfig {
            hash_history_len: 3,
            ..StoreConfig::default()
        })
        .unwrap();
        for v in 1..=5 {
            store.append_hash_sample(v as f64);
        }
        assert_eq!(store.get_hash_history(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_network_stats_replace_and_clear() {
        let store = store();
        let stats = NetworkStats::complete(12.5, 840_000, "Foundry USA".to_string(), 650.0, 8.8e13);
        store.replace_network_stats(stats.clone());
        assert_eq!(store.get_network_stats(), stats);

        store.clear_network_stats();
        assert!(store.get_network_stats().is_empty());
    }

    #[test]
    fn test_bootstrap_candles() {
        let store = store();
        store.register_ticker("btcusdt", TickerSource::Binance).unwrap();
        let bars: Vec<Candle> = (0..60)
            .map(|i| Candle::from_sample(t(i * 60), 100.0 + i as f64))
            .collect();

        assert!(store.bootstrap_candles("btcusdt", bars));

        let record = store.get_ticker("btcusdt").unwrap();
        assert_eq!(record.closed_candles.len(), 14);
        assert_eq!(record.closed_candles.back().unwrap().open, 158.0);
        assert_eq!(record.open_candle.unwrap().open, 159.0);
    }

    #[test]
    fn test_upsert_is_atomic_for_readers() {
        let store = Arc::new(store());
        store.register_ticker("btcusdt", TickerSource::Binance).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=2_000i64 {
                    store.upsert_ticker_at("btcusdt", i as f64, i as f64, true, t(i));
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let record = store.get_ticker("btcusdt").unwrap();
                    if let Some(price) = record.price {
                        assert_eq!(Some(price), record.last_published_price);
                        assert_eq!(price, record.change_24h);
                        assert_eq!(record.last_update.unwrap().timestamp() as f64, price);
                        assert_eq!(record.open_candle.unwrap().close, price);
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
