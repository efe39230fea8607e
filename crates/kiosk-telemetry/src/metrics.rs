//! Prometheus metrics for the crypto kiosk.
//!
//! Covers:
//! - Streaming feed state and reconnects
//! - Tick and parse-error counts per source
//! - REST poll outcomes and latency
//! - Miner totals and network statistics validity
//! - Connection health indicator
//!
//! # Panics
//!
//! Registration uses `unwrap()`. A failure means a duplicate metric name,
//! which is a programming error and should abort at first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    register_int_counter, register_int_gauge, CounterVec, Gauge, GaugeVec, HistogramVec,
    IntCounter, IntGauge,
};

/// Streaming feed state (1 = active state, 0 = inactive).
/// Labels: feed, state
pub static STREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "kiosk_stream_state",
        "Streaming feed state machine current state (1=active, 0=inactive)",
        &["feed", "state"]
    )
    .unwrap()
});

/// Streaming reconnect attempts.
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kiosk_stream_reconnect_total",
        "Total streaming feed reconnection attempts",
        &["feed", "reason"]
    )
    .unwrap()
});

/// Current reconnect delay in seconds.
pub static STREAM_BACKOFF_SECONDS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "kiosk_stream_backoff_seconds",
        "Delay before the next streaming reconnect attempt",
        &["feed"]
    )
    .unwrap()
});

/// Price updates applied to the store.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kiosk_ticks_total",
        "Price updates applied to the store",
        &["source"]
    )
    .unwrap()
});

/// Messages dropped because they failed to parse.
pub static PARSE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kiosk_parse_errors_total",
        "Upstream messages dropped on parse failure",
        &["source"]
    )
    .unwrap()
});

/// Failed poll cycles.
/// Labels: poller (coingecko/mempool/miners/bootstrap), kind (rate_limited/status/http/parse)
pub static POLL_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kiosk_poll_failures_total",
        "Failed REST poll cycles",
        &["poller", "kind"]
    )
    .unwrap()
});

/// Successful poll cycles.
pub static POLL_SUCCESS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kiosk_poll_success_total",
        "Successful REST poll cycles",
        &["poller"]
    )
    .unwrap()
});

/// Poll cycle duration.
pub static POLL_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "kiosk_poll_duration_ms",
        "REST poll cycle duration in milliseconds",
        &["poller"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 15000.0]
    )
    .unwrap()
});

pub static MINERS_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("kiosk_miners_connected", "Miners that answered the last poll").unwrap()
});

pub static MINERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "kiosk_miners_active",
        "Miners above the active hash-rate threshold"
    )
    .unwrap()
});

pub static MINER_HASHRATE_THS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("kiosk_miner_hashrate_ths", "Total local hash rate in TH/s").unwrap()
});

/// 1 when the last network statistics chain completed.
pub static NETWORK_STATS_VALID: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "kiosk_network_stats_valid",
        "Bitcoin network statistics available (1=valid)"
    )
    .unwrap()
});

/// Cached connectivity probe result.
pub static NETWORK_REACHABLE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "kiosk_network_reachable",
        "Connectivity probe result (1=reachable)"
    )
    .unwrap()
});

/// Connection health indicator (1 = current level).
pub static CONNECTION_HEALTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "kiosk_connection_health",
        "Derived connection health (1=current level)",
        &["level"]
    )
    .unwrap()
});

pub static FRAMES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiosk_frames_total", "Frames handed to the frame sink").unwrap()
});

const STREAM_STATES: [&str; 5] = ["disconnected", "connecting", "live", "error", "reconnecting"];
const HEALTH_LEVELS: [&str; 3] = ["healthy", "degraded", "critical"];

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Set the active state of a streaming feed.
    pub fn stream_state_set(feed: &str, state: &str) {
        for s in STREAM_STATES {
            STREAM_STATE.with_label_values(&[feed, s]).set(0.0);
        }
        STREAM_STATE.with_label_values(&[feed, state]).set(1.0);
    }

    pub fn stream_reconnect(feed: &str, reason: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[feed, reason]).inc();
    }

    pub fn stream_backoff(feed: &str, delay_secs: f64) {
        STREAM_BACKOFF_SECONDS.with_label_values(&[feed]).set(delay_secs);
    }

    pub fn tick(source: &str) {
        TICKS_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn parse_error(source: &str) {
        PARSE_ERRORS_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn poll_success(poller: &str, duration_ms: f64) {
        POLL_SUCCESS_TOTAL.with_label_values(&[poller]).inc();
        POLL_DURATION_MS.with_label_values(&[poller]).observe(duration_ms);
    }

    pub fn poll_failure(poller: &str, kind: &str) {
        POLL_FAILURES_TOTAL.with_label_values(&[poller, kind]).inc();
    }

    /// Publish one miner cycle.
    pub fn miner_cycle(connected: usize, active: usize, hashrate_ths: f64) {
        MINERS_CONNECTED.set(connected as i64);
        MINERS_ACTIVE.set(active as i64);
        MINER_HASHRATE_THS.set(hashrate_ths);
    }

    pub fn network_stats_valid(valid: bool) {
        NETWORK_STATS_VALID.set(if valid { 1.0 } else { 0.0 });
    }

    pub fn network_reachable(reachable: bool) {
        NETWORK_REACHABLE.set(if reachable { 1.0 } else { 0.0 });
    }

    pub fn connection_health(level: &str) {
        for l in HEALTH_LEVELS {
            CONNECTION_HEALTH.with_label_values(&[l]).set(0.0);
        }
        CONNECTION_HEALTH.with_label_values(&[level]).set(1.0);
    }

    pub fn frame_rendered() {
        FRAMES_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_state_is_exclusive() {
        Metrics::stream_state_set("test-feed", "connecting");
        Metrics::stream_state_set("test-feed", "live");

        assert_eq!(STREAM_STATE.with_label_values(&["test-feed", "live"]).get(), 1.0);
        assert_eq!(
            STREAM_STATE.with_label_values(&["test-feed", "connecting"]).get(),
            0.0
        );
    }

    #[test]
    fn test_health_is_exclusive() {
        Metrics::connection_health("degraded");
        Metrics::connection_health("healthy");

        assert_eq!(CONNECTION_HEALTH.with_label_values(&["healthy"]).get(), 1.0);
        assert_eq!(CONNECTION_HEALTH.with_label_values(&["degraded"]).get(), 0.0);
    }
}
