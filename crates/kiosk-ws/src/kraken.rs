//! Kraken v1 ticker stream.
//!
//! Kraken uses a fixed URL and a JSON subscribe handshake. The socket is
//! opened even with no pairs so the feed still reports its health. Data frames are
//! arrays `[channel_id, {c: [last, ..], o: [today, last_24h]}, "ticker", "PAIR"]`;
//! event frames are objects and carry no prices.

use crate::error::{WsError, WsResult};
use crate::provider::{decimal, StreamProvider, Tick};
use kiosk_core::TickerSource;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com";

/// Kraken provider with a key → pair mapping (`xmrusdt` → `XMR/USDT`).
#[derive(Debug, Clone)]
pub struct KrakenProvider {
    url: String,
    pairs: HashMap<String, String>,
    /// Slash-free pair → store key.
    by_pair: HashMap<String, String>,
}

impl KrakenProvider {
    pub fn new(url: impl Into<String>, pairs: HashMap<String, String>) -> Self {
        let by_pair = pairs
            .iter()
            .map(|(key, pair)| (normalize_pair(pair), key.clone()))
            .collect();
        Self {
            url: url.into(),
            pairs,
            by_pair,
        }
    }

    pub fn with_pairs(pairs: HashMap<String, String>) -> Self {
        Self::new(KRAKEN_WS_URL, pairs)
    }

    /// Store key for a pair as Kraken reports it.
    pub fn key_for_pair(&self, pair: &str) -> Option<&str> {
        self.by_pair.get(&normalize_pair(pair)).map(String::as_str)
    }

    fn pairs_for(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter_map(|k| self.pairs.get(k).cloned())
            .collect()
    }
}

fn normalize_pair(pair: &str) -> String {
    pair.replace('/', "").to_uppercase()
}

impl StreamProvider for KrakenProvider {
    fn source(&self) -> TickerSource {
        TickerSource::Kraken
    }

    fn endpoint(&self, _keys: &[String]) -> Option<String> {
        Some(self.url.clone())
    }

    fn handshake(&self, keys: &[String]) -> WsResult<Option<String>> {
        let pairs = self.pairs_for(keys);
        if pairs.is_empty() {
            return Ok(None);
        }
        let msg = json!({
            "event": "subscribe",
            "pair": pairs,
            "subscription": { "name": "ticker" }
        });
        Ok(Some(serde_json::to_string(&msg)?))
    }

    fn parse(&self, text: &str) -> WsResult<Vec<Tick>> {
        let msg: Value = serde_json::from_str(text)?;

        if let Some(event) = msg.get("event").and_then(Value::as_str) {
            match event {
                "heartbeat" => {}
                "subscriptionStatus" if msg.get("status").and_then(Value::as_str) == Some("error") => {
                    warn!(message = ?msg.get("errorMessage"), "Kraken subscription rejected");
                }
                _ => debug!(event, "Kraken event"),
            }
            return Ok(Vec::new());
        }

        let Some(frame) = msg.as_array() else {
            return Err(WsError::ParseError(format!("unexpected frame: {text}")));
        };
        if frame.len() < 4 || frame[2].as_str() != Some("ticker") {
            return Ok(Vec::new());
        }

        let data = &frame[1];
        let pair = frame[3]
            .as_str()
            .ok_or_else(|| WsError::ParseError("missing pair".to_string()))?;
        let Some(key) = self.key_for_pair(pair) else {
            return Ok(Vec::new());
        };

        let price = decimal(&data["c"][0], "c")?;
        let open_24h = decimal(&data["o"][1], "o")?;
        let change_24h = if open_24h > 0.0 {
            (price - open_24h) / open_24h * 100.0
        } else {
            0.0
        };

        Ok(vec![Tick {
            key: key.to_string(),
            price,
            change_24h,
        }])
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> KrakenProvider {
        KrakenProvider::with_pairs(HashMap::from([
            ("xmrusdt".to_string(), "XMR/USDT".to_string()),
            ("esxusd".to_string(), "ESX/USD".to_string()),
        ]))
    }

    #[test]
    fn test_handshake_lists_pairs() {
        let p = provider();
        let keys = vec!["xmrusdt".to_string()];
        let msg: Value = serde_json::from_str(&p.handshake(&keys).unwrap().unwrap()).unwrap();

        assert_eq!(msg["event"], "subscribe");
        assert_eq!(msg["pair"], json!(["XMR/USDT"]));
        assert_eq!(msg["subscription"]["name"], "ticker");
        assert_eq!(p.endpoint(&keys).unwrap(), KRAKEN_WS_URL);
    }

    #[test]
    fn test_no_pairs_connects_without_subscribing() {
        let p = KrakenProvider::with_pairs(HashMap::new());
        assert_eq!(p.endpoint(&[]).unwrap(), KRAKEN_WS_URL);
        assert!(p.handshake(&[]).unwrap().is_none());
    }

    #[test]
    fn test_parse_ticker_frame() {
        let p = provider();
        let text = r#"[42,{"c":["165.00","0.5"],"o":["160.00","150.00"]},"ticker","XMR/USDT"]"#;

        let ticks = p.parse(text).unwrap();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].key, "xmrusdt");
        assert_eq!(ticks[0].price, 165.0);
        assert!((ticks[0].change_24h - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_open_gives_zero_change() {
        let p = provider();
        let text = r#"[1,{"c":["2.5","1"],"o":["0","0"]},"ticker","ESX/USD"]"#;
        let ticks = p.parse(text).unwrap();
        assert_eq!(ticks[0].change_24h, 0.0);
    }

    #[test]
    fn test_events_and_unknown_pairs_are_ignored() {
        let p = provider();
        assert!(p.parse(r#"{"event":"heartbeat"}"#).unwrap().is_empty());
        assert!(p
            .parse(r#"{"event":"systemStatus","status":"online"}"#)
            .unwrap()
            .is_empty());
        assert!(p
            .parse(r#"[1,{"c":["1","1"],"o":["1","1"]},"ticker","DOGE/USD"]"#)
            .unwrap()
            .is_empty());
        assert!(p.parse(r#"[1,{},"spread","XMR/USDT"]"#).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_ticker_is_error() {
        let p = provider();
        assert!(p.parse(r#"[1,{"c":[],"o":["1","1"]},"ticker","XMR/USDT"]"#).is_err());
        assert!(p.parse("\"text\"").is_err());
    }
}
