//! Main application orchestration.
//!
//! Startup order:
//! 1. Wait (bounded) for the network
//! 2. Register symbols with their sources
//! 3. REST bootstrap and the first CoinGecko poll
//! 4. Spawn drivers, pollers and the connectivity monitor
//! 5. Run the frame loop until Ctrl-C / SIGTERM

use crate::config::AppConfig;
use crate::error::AppResult;
use kiosk_dashboard::{run_frame_loop, DashboardState, LogFrameSink};
use kiosk_feed::Store;
use kiosk_health::{
    wait_for_internet, ConnectivityHandle, ConnectivityMonitor, HealthAggregator, TcpProbe,
};
use kiosk_poll::{Bootstrapper, CoinGeckoPoller, MempoolPoller, MinerPoller};
use kiosk_telemetry::FeedStatsReporter;
use kiosk_ws::{BinanceProvider, DriverConfig, KrakenProvider, StreamDriver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Feed statistics output interval (1 hour).
const FEED_STATS_INTERVAL: Duration = Duration::from_secs(3600);

/// How long workers get to notice cancellation at exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Timeout of each startup connectivity probe.
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const FEED_SOURCES: [&str; 6] = ["binance", "kraken", "coingecko", "mempool", "miners", "bootstrap"];

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<Store>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create the store and register every configured symbol.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let store = Arc::new(Store::new(config.store_config())?);

        for key in config.symbol_keys() {
            store.register_ticker(&key, config.source_for(&key))?;
        }
        info!(
            tickers = store.ticker_count(),
            miners = config.miners_ips.len(),
            "Symbols registered"
        );

        Ok(Self {
            config,
            store,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Cancelling this token stops every worker and the frame loop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Seed prices and candles over REST. Never fails on upstream errors.
    pub async fn bootstrap(&self) -> AppResult<()> {
        let bootstrapper = Bootstrapper::new(self.config.bootstrap_config(), self.store.clone())?;
        bootstrapper
            .run(&self.config.main_keys(), &self.config.active_kraken_pairs())
            .await;

        let coingecko = CoinGeckoPoller::new(
            self.config.coingecko_config(),
            self.store.clone(),
            self.shutdown.clone(),
        )?;
        if coingecko.has_coins() {
            match coingecko.poll_once().await {
                Ok(n) => info!(applied = n, "CoinGecko bootstrap complete"),
                Err(e) => warn!(error = %e, "CoinGecko bootstrap failed"),
            }
        }
        Ok(())
    }

    /// Run until shutdown. Only a frame sink failure is fatal.
    pub async fn run(self) -> AppResult<()> {
        let health_config = self.config.health.clone();

        let startup_probe = TcpProbe::new(health_config.startup_addr.clone(), STARTUP_PROBE_TIMEOUT);
        let reachable = wait_for_internet(
            &startup_probe,
            Duration::from_secs(health_config.startup_interval_secs),
            Duration::from_secs(health_config.startup_max_wait_secs),
            &self.shutdown,
        )
        .await;

        self.bootstrap().await?;

        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        // Streaming drivers
        let binance = StreamDriver::new(
            BinanceProvider::new(self.config.endpoints.binance_ws.clone()),
            self.store.clone(),
            DriverConfig::default(),
            self.shutdown.clone(),
        );
        let kraken = StreamDriver::new(
            KrakenProvider::new(
                self.config.endpoints.kraken_ws.clone(),
                self.config.active_kraken_pairs(),
            ),
            self.store.clone(),
            DriverConfig::default(),
            self.shutdown.clone(),
        );
        let binance_status = binance.status_handle();
        let kraken_status = kraken.status_handle();
        workers.push(tokio::spawn(binance.run()));
        workers.push(tokio::spawn(kraken.run()));

        // Pollers
        let coingecko = CoinGeckoPoller::new(
            self.config.coingecko_config(),
            self.store.clone(),
            self.shutdown.clone(),
        )?;
        workers.push(tokio::spawn(coingecko.run()));

        let mempool = MempoolPoller::new(
            self.config.mempool_config(),
            self.store.clone(),
            self.shutdown.clone(),
        )?;
        workers.push(tokio::spawn(mempool.run()));

        let miners = MinerPoller::new(
            self.config.miner_config(),
            self.store.clone(),
            self.shutdown.clone(),
        )?;
        workers.push(tokio::spawn(miners.run()));

        // Connectivity
        let connectivity = ConnectivityHandle::new(reachable);
        let monitor = ConnectivityMonitor::new(
            TcpProbe::new(
                health_config.probe_addr.clone(),
                Duration::from_millis(health_config.probe_timeout_ms),
            ),
            self.config.connectivity_interval(),
            connectivity.clone(),
            self.shutdown.clone(),
        );
        workers.push(tokio::spawn(monitor.run()));

        workers.push(tokio::spawn(report_feed_stats(self.shutdown.clone())));
        workers.push(tokio::spawn(listen_for_signals(self.shutdown.clone())));

        let health = HealthAggregator::new(binance_status, kraken_status, connectivity);
        let dashboard_config = self.config.dashboard_config();
        let sink = LogFrameSink::new(dashboard_config.frame_log_path.as_ref().map(PathBuf::from));
        let fps = dashboard_config.fps;
        let dashboard = DashboardState::new(self.store.clone(), health, dashboard_config)?;

        info!(fps, "Entering frame loop");
        let result = run_frame_loop(dashboard, sink, fps, self.shutdown.clone()).await;
        if let Err(e) = &result {
            error!(error = %e, "Frame loop failed");
        }

        info!("Shutting down");
        self.shutdown.cancel();
        for worker in workers {
            if tokio::time::timeout(SHUTDOWN_GRACE, worker).await.is_err() {
                warn!("Worker did not stop in time");
            }
        }

        info!("Final statistics summary:");
        feed_stats_reporter().output_summary();

        result.map_err(Into::into)
    }
}

fn feed_stats_reporter() -> FeedStatsReporter {
    FeedStatsReporter::new(FEED_SOURCES.iter().map(|s| s.to_string()).collect())
}

async fn report_feed_stats(shutdown: CancellationToken) {
    let reporter = feed_stats_reporter();
    let mut interval = tokio::time::interval(FEED_STATS_INTERVAL);
    // First tick completes immediately
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => reporter.output_summary(),
            () = shutdown.cancelled() => break,
        }
    }
}

async fn listen_for_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                    () = shutdown.cancelled() => return,
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
            _ = term.recv() => info!("SIGTERM received"),
            () = shutdown.cancelled() => return,
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
            () = shutdown.cancelled() => return,
        }
    }
    shutdown.cancel();
}
