//! Frame model handed to the renderer.
//!
//! Everything here is already formatted; the renderer only lays it out.

use kiosk_core::{Candle, ConnectionHealth};
use serde::Serialize;
use std::fmt::Write as _;

/// One immutable frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Timestamp when the frame was collected (Unix milliseconds).
    pub timestamp_ms: i64,
    /// Rotating main symbol, absent when none is configured.
    pub main: Option<MainPanel>,
    /// Top-right corner: miner summary or clock.
    pub top_right: TopRight,
    /// Network line; only present while Bitcoin is the main symbol.
    pub network: Option<NetworkLine>,
    /// Scrolling marquee, in configured order.
    pub marquee: Vec<MarqueeEntry>,
    /// Hash-rate overlay samples (TH/s), oldest first. Empty without miners.
    pub hash_history: Vec<f64>,
    pub health: ConnectionHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainPanel {
    pub key: String,
    pub display_name: String,
    pub body: MainBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MainBody {
    /// Fresh price with chart.
    Price {
        price_text: String,
        change_text: String,
        change_up: bool,
        /// Closed candles followed by the open one.
        candles: Vec<Candle>,
    },
    /// Missing or stale data.
    Placeholder { status_text: String },
}

/// Miner line colour state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MinerColor {
    /// Every miner connected and active.
    AllActive,
    /// At least one connected.
    Partial,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopRight {
    Miners { text: String, color: MinerColor },
    Clock { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkLine {
    pub text: String,
    /// False while the placeholder is shown.
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarqueeEntry {
    pub name: String,
    /// `$1,234.56`, or `None` when the symbol has no price yet.
    pub price_text: Option<String>,
    pub change_up: bool,
}

impl MarqueeEntry {
    pub fn label(&self) -> String {
        match &self.price_text {
            Some(price) => format!("{} {price}", self.name),
            None => format!("{} ---", self.name),
        }
    }
}

impl Frame {
    /// Plain-text rendition, without the timestamp.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        match &self.main {
            Some(panel) => match &panel.body {
                MainBody::Price {
                    price_text,
                    change_text,
                    candles,
                    ..
                } => {
                    let _ = write!(
                        out,
                        "{} {price_text} {change_text} [{} candles]",
                        panel.display_name,
                        candles.len()
                    );
                }
                MainBody::Placeholder { status_text } => {
                    let _ = write!(out, "{} {status_text}", panel.display_name);
                }
            },
            None => out.push_str("No data"),
        }

        match &self.top_right {
            TopRight::Miners { text, color } => {
                let _ = write!(out, " | miners {text} ({color:?})");
            }
            TopRight::Clock { text } => {
                let _ = write!(out, " | {text}");
            }
        }
        let _ = write!(out, " | {}", self.health);

        if let Some(network) = &self.network {
            let _ = write!(out, "\n{}", network.text);
        }
        if !self.marquee.is_empty() {
            let labels: Vec<String> = self.marquee.iter().map(MarqueeEntry::label).collect();
            let _ = write!(out, "\n{}", labels.join(" • "));
        }
        out
    }
}
