//! Connection health derived from stream states and reachability.

use crate::probe::ConnectivityHandle;
use kiosk_core::{ConnectionHealth, FeedStatus};
use kiosk_telemetry::Metrics;
use kiosk_ws::StatusHandle;

/// How one stream counts towards health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamClass {
    Ok,
    /// Not started; counts as not ok.
    Unknown,
    Bad,
}

pub fn classify(status: FeedStatus) -> StreamClass {
    match status {
        FeedStatus::Live | FeedStatus::Connecting => StreamClass::Ok,
        FeedStatus::Disconnected => StreamClass::Unknown,
        FeedStatus::Error | FeedStatus::Reconnecting => StreamClass::Bad,
    }
}

/// Combine reachability with the two stream states.
///
/// Unreachable network is always critical. Otherwise both streams ok is
/// healthy, exactly one is degraded, none is critical.
pub fn derive_health(reachable: bool, first: FeedStatus, second: FeedStatus) -> ConnectionHealth {
    if !reachable {
        return ConnectionHealth::Critical;
    }
    let ok = [first, second]
        .into_iter()
        .filter(|s| classify(*s) == StreamClass::Ok)
        .count();
    match ok {
        2 => ConnectionHealth::Healthy,
        1 => ConnectionHealth::Degraded,
        _ => ConnectionHealth::Critical,
    }
}

fn level(health: ConnectionHealth) -> &'static str {
    match health {
        ConnectionHealth::Healthy => "healthy",
        ConnectionHealth::Degraded => "degraded",
        ConnectionHealth::Critical => "critical",
    }
}

/// Reads the two driver handles and the cached probe result.
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    binance: StatusHandle,
    kraken: StatusHandle,
    connectivity: ConnectivityHandle,
}

impl HealthAggregator {
    pub fn new(binance: StatusHandle, kraken: StatusHandle, connectivity: ConnectivityHandle) -> Self {
        Self {
            binance,
            kraken,
            connectivity,
        }
    }

    /// Never blocks on the network.
    pub fn connection_health(&self) -> ConnectionHealth {
        let health = derive_health(
            self.connectivity.is_reachable(),
            self.binance.state(),
            self.kraken.state(),
        );
        Metrics::connection_health(level(health));
        health
    }

    pub fn is_reachable(&self) -> bool {
        self.connectivity.is_reachable()
    }

    /// `(name, state)` for each stream.
    pub fn stream_states(&self) -> [(&'static str, FeedStatus); 2] {
        [
            (self.binance.name(), self.binance.state()),
            (self.kraken.name(), self.kraken.state()),
        ]
    }
}
