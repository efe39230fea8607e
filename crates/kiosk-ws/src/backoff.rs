//! Reconnect backoff.
//!
//! Delays grow geometrically from `initial` by `multiplier` up to `max`.
//! The policy is only reset once a connection reaches `Live`, so a feed
//! that keeps failing during the handshake keeps backing off.

use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 1.8,
            max: Duration::from_secs(120),
        }
    }
}

/// Stateful exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    current_secs: f64,
    attempts: u32,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_secs: config.initial.as_secs_f64(),
            config,
            attempts: 0,
        }
    }

    /// Delay to wait now; advances the policy for the next call.
    pub fn next_delay(&mut self) -> Duration {
        let max = self.config.max.as_secs_f64();
        let delay = self.current_secs.min(max);
        self.current_secs = (self.current_secs * self.config.multiplier).min(max);
        self.attempts = self.attempts.saturating_add(1);
        Duration::from_secs_f64(delay)
    }

    pub fn reset(&mut self) {
        self.current_secs = self.config.initial.as_secs_f64();
        self.attempts = 0;
    }

    /// Consecutive failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
