//! Dashboard configuration.

use crate::error::{DashboardError, DashboardResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Frame collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Frames per second handed to the sink.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Symbols rotated through the main panel.
    #[serde(default = "default_main_symbols")]
    pub main_symbols: Vec<String>,
    #[serde(default)]
    pub marquee_symbols: Vec<String>,
    /// Per-key price decimals.
    #[serde(default)]
    pub price_decimals: HashMap<String, usize>,
    /// Data older than this renders as a placeholder.
    #[serde(default = "default_data_timeout_secs")]
    pub data_timeout_secs: u64,
    #[serde(default = "default_marquee_refresh_secs")]
    pub marquee_refresh_secs: f64,
    /// Main-symbol rotation period, used with more than one main symbol.
    #[serde(default = "default_rotation_secs")]
    pub rotation_secs: u64,
    /// Write frames as JSON lines to this file instead of the log.
    #[serde(default)]
    pub frame_log_path: Option<String>,
}

fn default_fps() -> u32 {
    25
}

fn default_main_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string()]
}

fn default_data_timeout_secs() -> u64 {
    300
}

fn default_marquee_refresh_secs() -> f64 {
    8.0
}

fn default_rotation_secs() -> u64 {
    21
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            main_symbols: default_main_symbols(),
            marquee_symbols: Vec::new(),
            price_decimals: HashMap::new(),
            data_timeout_secs: default_data_timeout_secs(),
            marquee_refresh_secs: default_marquee_refresh_secs(),
            rotation_secs: default_rotation_secs(),
            frame_log_path: None,
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> DashboardResult<()> {
        if self.fps == 0 {
            return Err(DashboardError::InvalidConfig("fps must be positive".to_string()));
        }
        if self.main_symbols.is_empty() {
            return Err(DashboardError::InvalidConfig(
                "at least one main symbol is required".to_string(),
            ));
        }
        if !(self.marquee_refresh_secs.is_finite()
            && self.marquee_refresh_secs > 0.0
            && self.marquee_refresh_secs <= 86_400.0)
        {
            return Err(DashboardError::InvalidConfig(format!(
                "marquee_refresh_secs must be in (0, 86400], got {}",
                self.marquee_refresh_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: DashboardConfig = serde_json::from_str(r#"{"fps": 10}"#).unwrap();
        assert_eq!(config.fps, 10);
        assert_eq!(config.main_symbols, vec!["BTCUSDT"]);
        assert_eq!(config.data_timeout_secs, 300);
        assert_eq!(config.rotation_secs, 21);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let config = DashboardConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
