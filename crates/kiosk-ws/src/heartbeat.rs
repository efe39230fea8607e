//! Keepalive for streaming connections.
//!
//! Sends a WebSocket ping every `interval` and fails the connection if the
//! matching pong does not arrive within `timeout`.

use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct HeartbeatState {
    last_ping: Option<Instant>,
    last_pong: Option<Instant>,
    last_message: Instant,
    waiting_for_pong: bool,
}

/// Ping/pong bookkeeping for one connection.
#[derive(Debug)]
pub struct HeartbeatManager {
    interval: Duration,
    timeout: Duration,
    state: RwLock<HeartbeatState>,
}

impl HeartbeatManager {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            state: RwLock::new(HeartbeatState {
                last_ping: None,
                last_pong: None,
                last_message: Instant::now(),
                waiting_for_pong: false,
            }),
        }
    }

    /// Reset state on a fresh connection.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.last_ping = None;
        state.last_pong = None;
        state.last_message = Instant::now();
        state.waiting_for_pong = false;
    }

    pub fn record_ping(&self) {
        let mut state = self.state.write();
        state.last_ping = Some(Instant::now());
        state.waiting_for_pong = true;
    }

    pub fn record_pong(&self) {
        let mut state = self.state.write();
        let now = Instant::now();
        if let Some(sent) = state.last_ping {
            debug!(rtt_ms = now.duration_since(sent).as_millis() as u64, "Received pong");
        }
        state.last_pong = Some(now);
        state.waiting_for_pong = false;
    }

    pub fn record_message(&self) {
        self.state.write().last_message = Instant::now();
    }

    /// Pong overdue.
    pub fn is_timed_out(&self) -> bool {
        let state = self.state.read();
        state.waiting_for_pong
            && state
                .last_ping
                .is_some_and(|sent| sent.elapsed() > self.timeout)
    }

    /// A ping is due: none outstanding and the interval has elapsed since the last one.
    pub fn should_send_ping(&self) -> bool {
        let state = self.state.read();
        if state.waiting_for_pong {
            return false;
        }
        match state.last_ping {
            Some(sent) => sent.elapsed() >= self.interval,
            None => state.last_message.elapsed() >= self.interval,
        }
    }

    /// Sleep until the next keepalive check.
    pub async fn wait_for_check(&self) {
        let tick = (self.timeout / 2).min(self.interval / 2).max(Duration::from_millis(100));
        tokio::time::sleep(tick).await;
    }
}
