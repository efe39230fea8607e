//! Provider abstraction for streaming feeds.

use crate::error::WsResult;
use kiosk_core::TickerSource;
use std::time::Duration;

/// One parsed price update.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Store key (lowercase symbol).
    pub key: String,
    pub price: f64,
    /// 24h change in percent.
    pub change_24h: f64,
}

/// Wire-level behaviour of one streaming provider.
///
/// The driver owns the connection lifecycle; a provider only knows how to
/// address, greet and decode its upstream.
pub trait StreamProvider: Send + Sync {
    /// Source whose tickers this provider feeds.
    fn source(&self) -> TickerSource;

    /// Connection URL for the given store keys, or `None` if there is
    /// nothing to subscribe to.
    fn endpoint(&self, keys: &[String]) -> Option<String>;

    /// Text frame to send right after connecting, if the provider needs one.
    fn handshake(&self, keys: &[String]) -> WsResult<Option<String>>;

    /// Decode one text frame. Control and status frames yield no ticks.
    fn parse(&self, text: &str) -> WsResult<Vec<Tick>>;

    /// Keepalive ping interval.
    fn ping_interval(&self) -> Duration;

    /// Whether a close/error reason is a routine server restart.
    fn is_maintenance(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        ["reconnect", "maintenance", "restart"]
            .iter()
            .any(|w| reason.contains(w))
    }
}

/// Parse a decimal that may arrive as a JSON string or number.
pub(crate) fn decimal(value: &serde_json::Value, field: &str) -> WsResult<f64> {
    let parsed = match value {
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| crate::error::WsError::ParseError(format!("invalid {field}: {value}")))
}
