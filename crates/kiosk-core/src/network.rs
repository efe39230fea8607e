//! Bitcoin network statistics.

use serde::{Deserialize, Serialize};

/// Network statistics from the block explorer.
///
/// Written wholesale: either every field is present or the record is reset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Recommended fee in sat/vB.
    pub fee_rate: Option<f64>,
    pub block_height: Option<u64>,
    /// Pool that mined the tip block.
    pub mining_pool: Option<String>,
    /// Network hashrate in EH/s.
    pub network_hashrate: Option<f64>,
    pub network_difficulty: Option<f64>,
}

impl NetworkStats {
    /// Fully populated record.
    pub fn complete(
        fee_rate: f64,
        block_height: u64,
        mining_pool: String,
        network_hashrate: f64,
        network_difficulty: f64,
    ) -> Self {
        Self {
            fee_rate: Some(fee_rate),
            block_height: Some(block_height),
            mining_pool: Some(mining_pool),
            network_hashrate: Some(network_hashrate),
            network_difficulty: Some(network_difficulty),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fee_rate.is_some()
            && self.block_height.is_some()
            && self.mining_pool.is_some()
            && self.network_hashrate.is_some()
            && self.network_difficulty.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
