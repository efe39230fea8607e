//! Local miner telemetry.

use serde::{Deserialize, Serialize};

/// Result of polling one miner endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinerReading {
    /// Hashrate in TH/s.
    pub hashrate: f64,
    /// Best share difficulty.
    pub best_difficulty: f64,
    /// Whether the endpoint answered.
    pub connected: bool,
}

impl MinerReading {
    /// Reading for an endpoint that failed or timed out.
    pub const DISCONNECTED: Self = Self {
        hashrate: 0.0,
        best_difficulty: 0.0,
        connected: false,
    };

    /// Build a reading from a successful response, clamping negatives to zero.
    pub fn online(hashrate: f64, best_difficulty: f64) -> Self {
        Self {
            hashrate: non_negative(hashrate),
            best_difficulty: non_negative(best_difficulty),
            connected: true,
        }
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Aggregate over all configured miners for one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MinerAggregate {
    /// Sum of hashrates in TH/s.
    pub total_hashrate: f64,
    /// Max best difficulty.
    pub best_difficulty: f64,
    pub connected_count: usize,
    /// Miners hashing above the active threshold.
    pub active_count: usize,
    /// Number of configured endpoints (fixed at startup).
    pub total_configured: usize,
}

impl MinerAggregate {
    /// Empty aggregate for a given number of configured miners.
    pub fn empty(total_configured: usize) -> Self {
        Self {
            total_configured,
            ..Self::default()
        }
    }

    /// Reduce one cycle's readings. Independent of arrival order.
    pub fn from_readings(
        readings: &[MinerReading],
        active_threshold: f64,
        total_configured: usize,
    ) -> Self {
        readings.iter().fold(Self::empty(total_configured), |mut agg, r| {
            agg.total_hashrate += r.hashrate;
            agg.best_difficulty = agg.best_difficulty.max(r.best_difficulty);
            if r.connected {
                agg.connected_count += 1;
            }
            if r.hashrate > active_threshold {
                agg.active_count += 1;
            }
            agg
        })
    }

    /// Whether any miner is configured at all.
    pub fn has_miners(&self) -> bool {
        self.total_configured > 0
    }

    /// All configured miners connected and active.
    pub fn all_healthy(&self) -> bool {
        self.has_miners()
            && self.connected_count == self.total_configured
            && self.active_count == self.total_configured
    }
}
