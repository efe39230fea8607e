//! Connectivity probing and connection health.
//!
//! The health indicator combines the two streaming drivers' states with a
//! cached "network reachable" flag. The flag is refreshed by a background
//! probe so reading health never waits on the network.

pub mod aggregator;
pub mod probe;

pub use aggregator::{classify, derive_health, HealthAggregator, StreamClass};
pub use probe::{
    wait_for_internet, ConnectivityHandle, ConnectivityMonitor, ConnectivityProbe, HealthConfig,
    TcpProbe,
};
