//! Binance combined ticker stream.
//!
//! The subscription set is encoded in the URL path
//! (`/ws/btcusdt@ticker/ethusdt@ticker`), so there is no handshake and the
//! URL is rebuilt from the registered keys on every connection attempt.

use crate::error::{WsError, WsResult};
use crate::provider::{decimal, StreamProvider, Tick};
use kiosk_core::TickerSource;
use serde_json::Value;
use std::time::Duration;

pub const BINANCE_WS_BASE: &str = "wss://stream.binance.com:9443/ws";

#[derive(Debug, Clone)]
pub struct BinanceProvider {
    base_url: String,
}

impl BinanceProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new(BINANCE_WS_BASE)
    }
}

impl StreamProvider for BinanceProvider {
    fn source(&self) -> TickerSource {
        TickerSource::Binance
    }

    fn endpoint(&self, keys: &[String]) -> Option<String> {
        if keys.is_empty() {
            return None;
        }
        let streams: Vec<String> = keys.iter().map(|k| format!("{k}@ticker")).collect();
        Some(format!("{}/{}", self.base_url, streams.join("/")))
    }

    fn handshake(&self, _keys: &[String]) -> WsResult<Option<String>> {
        Ok(None)
    }

    fn parse(&self, text: &str) -> WsResult<Vec<Tick>> {
        let msg: Value = serde_json::from_str(text)?;
        let Some(obj) = msg.as_object() else {
            return Err(WsError::ParseError(format!("unexpected frame: {text}")));
        };
        let Some(symbol) = obj.get("s").and_then(Value::as_str) else {
            return Ok(Vec::new());
        };

        let price = decimal(obj.get("c").unwrap_or(&Value::Null), "c")?;
        let change_24h = decimal(obj.get("P").unwrap_or(&Value::Null), "P")?;

        Ok(vec![Tick {
            key: symbol.to_lowercase(),
            price,
            change_24h,
        }])
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_streams() {
        let provider = BinanceProvider::default();
        let keys = vec!["btcusdt".to_string(), "ethusdt".to_string()];
        assert_eq!(
            provider.endpoint(&keys).unwrap(),
            "wss://stream.binance.com:9443/ws/btcusdt@ticker/ethusdt@ticker"
        );
        assert!(provider.endpoint(&[]).is_none());
        assert!(provider.handshake(&keys).unwrap().is_none());
    }

    #[test]
    fn test_parse_ticker_event() {
        let provider = BinanceProvider::default();
        let text = r#"{"e":"24hrTicker","E":1700000000000,"s":"BTCUSDT","c":"50500.10","P":"1.234"}"#;

        let ticks = provider.parse(text).unwrap();
        assert_eq!(
            ticks,
            vec![Tick {
                key: "btcusdt".to_string(),
                price: 50500.10,
                change_24h: 1.234,
            }]
        );
    }

    #[test]
    fn test_parse_ignores_control_frames() {
        let provider = BinanceProvider::default();
        assert!(provider.parse(r#"{"result":null,"id":1}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let provider = BinanceProvider::default();
        assert!(provider.parse("not json").is_err());
        assert!(provider.parse(r#"{"s":"BTCUSDT","c":"abc","P":"1.0"}"#).is_err());
        assert!(provider.parse(r#"{"s":"BTCUSDT","P":"1.0"}"#).is_err());
        assert!(provider.parse("[1,2,3]").is_err());
    }

    #[test]
    fn test_maintenance_detection() {
        let provider = BinanceProvider::default();
        assert!(provider.is_maintenance("Server RESTART in progress"));
        assert!(!provider.is_maintenance("connection reset by peer"));
    }
}
