//! Driver status handle.

use chrono::{DateTime, Utc};
use kiosk_core::FeedStatus;
use parking_lot::RwLock;
use std::sync::Arc;

/// Current state of a streaming driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverStatus {
    pub state: FeedStatus,
    /// Human-readable reason for the current state.
    pub detail: String,
    pub since: DateTime<Utc>,
}

/// Shared, cloneable view of one driver's status.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    name: &'static str,
    inner: Arc<RwLock<DriverStatus>>,
}

impl StatusHandle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(DriverStatus {
                state: FeedStatus::Disconnected,
                detail: "not started".to_string(),
                since: Utc::now(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> FeedStatus {
        self.inner.read().state
    }

    pub fn snapshot(&self) -> DriverStatus {
        self.inner.read().clone()
    }

    pub fn set(&self, state: FeedStatus, detail: impl Into<String>) {
        let mut status = self.inner.write();
        if status.state != state {
            status.since = Utc::now();
        }
        status.state = state;
        status.detail = detail.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let handle = StatusHandle::new("binance");
        let reader = handle.clone();
        assert_eq!(reader.state(), FeedStatus::Disconnected);

        handle.set(FeedStatus::Error, "connection refused");
        let status = reader.snapshot();
        assert_eq!(status.state, FeedStatus::Error);
        assert_eq!(status.detail, "connection refused");
        assert_eq!(reader.name(), "binance");
    }
}
