//! Streaming feed driver.
//!
//! Runs one provider forever:
//! `Disconnected → Connecting → Live ⇄ Error → Reconnecting → Connecting → …`
//!
//! Parse failures drop the frame and keep the connection. Transport
//! failures end the session, and the driver sleeps out the backoff before
//! the next attempt. The backoff is only reset once a session reaches `Live`.

use crate::backoff::{BackoffConfig, BackoffPolicy};
use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::provider::StreamProvider;
use crate::status::StatusHandle;
use futures_util::{SinkExt, StreamExt};
use kiosk_core::FeedStatus;
use kiosk_feed::Store;
use kiosk_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Driver tuning.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Sleep between checks while there is nothing to subscribe to.
    pub idle_delay: Duration,
    /// Pong must arrive within this after a ping.
    pub pong_timeout: Duration,
    /// Upper bound on the TCP + TLS + upgrade handshake.
    pub connect_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
            backoff: BackoffConfig::default(),
        }
    }
}

fn state_label(state: FeedStatus) -> &'static str {
    match state {
        FeedStatus::Disconnected => "disconnected",
        FeedStatus::Connecting => "connecting",
        FeedStatus::Live => "live",
        FeedStatus::Error => "error",
        FeedStatus::Reconnecting => "reconnecting",
    }
}

/// One streaming connection with automatic reconnection.
pub struct StreamDriver<P: StreamProvider> {
    provider: P,
    store: Arc<Store>,
    config: DriverConfig,
    status: StatusHandle,
    heartbeat: HeartbeatManager,
    backoff: BackoffPolicy,
    shutdown: CancellationToken,
}

impl<P: StreamProvider> StreamDriver<P> {
    pub fn new(
        provider: P,
        store: Arc<Store>,
        config: DriverConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let feed: &'static str = match provider.source() {
            kiosk_core::TickerSource::Binance => "binance",
            kiosk_core::TickerSource::Kraken => "kraken",
            kiosk_core::TickerSource::CoinGecko => "coingecko",
        };
        let heartbeat = HeartbeatManager::new(provider.ping_interval(), config.pong_timeout);
        Self {
            backoff: BackoffPolicy::new(config.backoff),
            status: StatusHandle::new(feed),
            provider,
            store,
            config,
            heartbeat,
            shutdown,
        }
    }

    /// Handle for the health aggregator.
    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    fn feed(&self) -> &'static str {
        self.status.name()
    }

    fn transition(&self, state: FeedStatus, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(feed = self.feed(), state = %state, detail = %detail, "Stream state");
        self.status.set(state, detail);
        self.store.set_source_status(self.provider.source(), state);
        Metrics::stream_state_set(self.feed(), state_label(state));
    }

    /// Run until the shutdown token is cancelled.
    pub async fn run(mut self) {
        info!(feed = self.feed(), "Stream driver started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let keys = self.store.keys_for_source(self.provider.source());
            let Some(url) = self.provider.endpoint(&keys) else {
                self.transition(FeedStatus::Disconnected, "no symbols to subscribe");
                tokio::select! {
                    () = tokio::time::sleep(self.config.idle_delay) => continue,
                    () = self.shutdown.cancelled() => break,
                }
            };

            self.transition(FeedStatus::Connecting, "connecting");
            let result = self.session(&url, &keys).await;

            if self.shutdown.is_cancelled() {
                break;
            }

            match result {
                Ok(()) => {
                    warn!(feed = self.feed(), "Stream ended");
                    Metrics::stream_reconnect(self.feed(), "ended");
                }
                Err(e) => {
                    let detail = e.to_string();
                    if self.provider.is_maintenance(&detail) {
                        info!(feed = self.feed(), reason = %detail, "Server requested reconnect");
                    } else {
                        error!(feed = self.feed(), error = %detail, "Stream error");
                    }
                    Metrics::stream_reconnect(self.feed(), e.kind());
                    self.transition(FeedStatus::Error, detail);
                }
            }

            let delay = self.backoff.next_delay();
            Metrics::stream_backoff(self.feed(), delay.as_secs_f64());
            self.transition(
                FeedStatus::Reconnecting,
                format!("retrying in {:.1}s", delay.as_secs_f64()),
            );
            info!(
                feed = self.feed(),
                attempt = self.backoff.attempts(),
                delay_secs = delay.as_secs_f64(),
                "Reconnecting"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => break,
            }
        }

        self.transition(FeedStatus::Disconnected, "shut down");
        info!(feed = self.feed(), "Stream driver stopped");
    }

    async fn session(&mut self, url: &str, keys: &[String]) -> WsResult<()> {
        info!(feed = self.feed(), %url, symbols = keys.len(), "Connecting");

        let connect = connect_async_tls_with_config(url, None, true, None);
        let (ws_stream, _response) = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| WsError::ConnectionFailed("connect timed out".to_string()))??;
        let (mut write, mut read) = ws_stream.split();

        if let Some(hello) = self.provider.handshake(keys)? {
            write.send(Message::Text(hello)).await?;
            debug!(feed = self.feed(), "Subscription sent");
        }

        self.backoff.reset();
        self.heartbeat.reset();
        self.transition(FeedStatus::Live, "connected");
        info!(feed = self.feed(), "Stream live");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(feed = self.feed(), ?e, "Close frame not sent");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Ping(data))) => {
                            self.heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => self.heartbeat.record_pong(),
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "no reason".to_string()));
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                        _ => {}
                    }
                }

                () = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        return Err(WsError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_send_ping() {
                        write.send(Message::Ping(Vec::new())).await?;
                        self.heartbeat.record_ping();
                    }
                }
            }
        }
    }

    fn handle_text(&self, text: &str) {
        self.heartbeat.record_message();
        let source = self.provider.source();

        match self.provider.parse(text) {
            Ok(ticks) => {
                for tick in ticks {
                    if self.store.upsert_from_source(
                        source,
                        &tick.key,
                        tick.price,
                        tick.change_24h,
                        true,
                    ) {
                        Metrics::tick(self.feed());
                    }
                }
            }
            Err(e) => {
                Metrics::parse_error(self.feed());
                warn!(feed = self.feed(), error = %e, "Dropping unparseable message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.idle_delay, Duration::from_secs(10));
        assert_eq!(config.pong_timeout, Duration::from_secs(10));
        assert_eq!(config.backoff.max, Duration::from_secs(120));
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(state_label(FeedStatus::Live), "live");
        assert_eq!(state_label(FeedStatus::Reconnecting), "reconnecting");
    }
}
