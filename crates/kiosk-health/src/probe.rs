//! Connectivity probe and its background monitor.

use chrono::{DateTime, Utc};
use kiosk_telemetry::Metrics;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Target of the periodic probe.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Target of the startup wait.
    #[serde(default = "default_startup_addr")]
    pub startup_addr: String,
    #[serde(default = "default_startup_interval_secs")]
    pub startup_interval_secs: u64,
    #[serde(default = "default_startup_max_wait_secs")]
    pub startup_max_wait_secs: u64,
}

fn default_probe_addr() -> String {
    "1.1.1.1:53".to_string()
}
fn default_probe_timeout_ms() -> u64 {
    2500
}
fn default_startup_addr() -> String {
    "8.8.8.8:53".to_string()
}
fn default_startup_interval_secs() -> u64 {
    2
}
fn default_startup_max_wait_secs() -> u64 {
    90
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_addr: default_probe_addr(),
            probe_timeout_ms: default_probe_timeout_ms(),
            startup_addr: default_startup_addr(),
            startup_interval_secs: default_startup_interval_secs(),
            startup_max_wait_secs: default_startup_max_wait_secs(),
        }
    }
}

/// Something that can tell whether the network is reachable.
pub trait ConnectivityProbe: Send + Sync {
    fn check(&self) -> impl Future<Output = bool> + Send;
}

/// TCP connect probe.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

impl ConnectivityProbe for TcpProbe {
    async fn check(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Probe connect failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, "Probe timed out");
                false
            }
        }
    }
}

/// Probe until the network answers or `max_wait` elapses. Returns the last result.
pub async fn wait_for_internet<P: ConnectivityProbe>(
    probe: &P,
    interval: Duration,
    max_wait: Duration,
    shutdown: &CancellationToken,
) -> bool {
    let started = Instant::now();
    loop {
        if probe.check().await {
            info!(waited_ms = started.elapsed().as_millis() as u64, "Network reachable");
            return true;
        }
        if started.elapsed() >= max_wait {
            warn!(max_wait_secs = max_wait.as_secs(), "Network still unreachable, continuing anyway");
            return false;
        }
        debug!("Waiting for network");
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = shutdown.cancelled() => return false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ConnectivityState {
    reachable: bool,
    checked_at: Option<DateTime<Utc>>,
}

/// Cached probe result, cheap to read from any thread.
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    inner: Arc<RwLock<ConnectivityState>>,
}

impl ConnectivityHandle {
    pub fn new(reachable: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ConnectivityState {
                reachable,
                checked_at: None,
            })),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.inner.read().reachable
    }

    pub fn checked_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().checked_at
    }

    pub fn record(&self, reachable: bool) {
        let mut state = self.inner.write();
        state.reachable = reachable;
        state.checked_at = Some(Utc::now());
    }
}

/// Background task refreshing a `ConnectivityHandle` at a fixed interval.
pub struct ConnectivityMonitor<P: ConnectivityProbe> {
    probe: P,
    interval: Duration,
    handle: ConnectivityHandle,
    shutdown: CancellationToken,
}

impl<P: ConnectivityProbe> ConnectivityMonitor<P> {
    pub fn new(
        probe: P,
        interval: Duration,
        handle: ConnectivityHandle,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            probe,
            interval,
            handle,
            shutdown,
        }
    }

    pub fn handle(&self) -> ConnectivityHandle {
        self.handle.clone()
    }

    /// Probe once and publish the result.
    pub async fn check_once(&self) -> bool {
        let reachable = self.probe.check().await;
        if reachable != self.handle.is_reachable() {
            info!(reachable, "Connectivity changed");
        }
        self.handle.record(reachable);
        Metrics::network_reachable(reachable);
        reachable
    }

    pub async fn run(self) {
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.shutdown.cancelled() => break,
            }
            self.check_once().await;
        }
        debug!("Connectivity monitor stopped");
    }
}
