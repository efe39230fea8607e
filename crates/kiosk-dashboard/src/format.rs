//! Display formatting for prices, hash rates and difficulties.

use std::collections::HashMap;

/// Local miner hash rate, already in TH/s.
pub fn format_hashrate(ths: f64) -> String {
    format!("{ths:.2} TH/s")
}

/// Difficulty with a K/M/G/T suffix.
pub fn format_difficulty(diff: f64) -> String {
    if diff >= 1e12 {
        format!("{:.2} T", diff / 1e12)
    } else if diff >= 1e9 {
        format!("{:.2} G", diff / 1e9)
    } else if diff >= 1e6 {
        format!("{:.2} M", diff / 1e6)
    } else if diff >= 1e3 {
        format!("{:.2} K", diff / 1e3)
    } else {
        format!("{diff:.0}")
    }
}

const HASH_UNITS: [&str; 5] = ["TH/s", "PH/s", "EH/s", "ZH/s", "YH/s"];
const EH_INDEX: usize = 2;

/// Network hash rate given in EH/s, rescaled so the mantissa is in [1, 1000).
pub fn format_network_hashrate(ehs: f64) -> String {
    if ehs <= 0.0 || !ehs.is_finite() {
        return "0.00 EH/s".to_string();
    }
    let mut value = ehs;
    let mut idx = EH_INDEX;
    while value >= 1000.0 && idx < HASH_UNITS.len() - 1 {
        value /= 1000.0;
        idx += 1;
    }
    while value < 1.0 && idx > 0 {
        value *= 1000.0;
        idx -= 1;
    }
    format!("{value:.2} {}", HASH_UNITS[idx])
}

/// Decimals for a symbol: configured override, else 4 below 10 and 2 otherwise.
pub fn price_decimals(key: &str, price: f64, overrides: &HashMap<String, usize>) -> usize {
    overrides
        .get(key)
        .copied()
        .unwrap_or(if price < 10.0 { 4 } else { 2 })
}

/// `1234567.891` with 2 decimals → `1,234,567.89`.
pub fn format_price(price: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, price.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// `↑ +1.23%` / `↓ -4.56%`.
pub fn format_change(change: f64) -> String {
    let arrow = if change >= 0.0 { '↑' } else { '↓' };
    format!("{arrow} {change:+.2}%")
}

/// Short name shown on screen: quote currency stripped.
pub fn display_name(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    let stripped = upper.replace("USDT", "").replace("USD", "");
    if stripped.is_empty() {
        upper
    } else {
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hashrate() {
        assert_eq!(format_hashrate(15.0), "15.00 TH/s");
        assert_eq!(format_hashrate(0.0), "0.00 TH/s");
        assert_eq!(format_hashrate(1.2345), "1.23 TH/s");
    }

    #[test]
    fn test_format_difficulty() {
        assert_eq!(format_difficulty(500.0), "500");
        assert_eq!(format_difficulty(4_290.0), "4.29 K");
        assert_eq!(format_difficulty(12_500_000.0), "12.50 M");
        assert_eq!(format_difficulty(4.29e9), "4.29 G");
        assert_eq!(format_difficulty(1.1e14), "110.00 T");
    }

    #[test]
    fn test_format_network_hashrate() {
        assert_eq!(format_network_hashrate(650.0), "650.00 EH/s");
        assert_eq!(format_network_hashrate(1_250.0), "1.25 ZH/s");
        assert_eq!(format_network_hashrate(0.5), "500.00 PH/s");
        assert_eq!(format_network_hashrate(0.0), "0.00 EH/s");
        assert_eq!(format_network_hashrate(-3.0), "0.00 EH/s");
    }

    #[test]
    fn test_price_decimals() {
        let mut overrides = HashMap::new();
        overrides.insert("xecusdt".to_string(), 8);
        assert_eq!(price_decimals("xecusdt", 0.00003, &overrides), 8);
        assert_eq!(price_decimals("adausdt", 0.45, &overrides), 4);
        assert_eq!(price_decimals("btcusdt", 67_000.0, &overrides), 2);
    }

    #[test]
    fn test_format_price_groups_thousands() {
        assert_eq!(format_price(67_123.456, 2), "67,123.46");
        assert_eq!(format_price(1_234_567.0, 2), "1,234,567.00");
        assert_eq!(format_price(999.0, 0), "999");
        assert_eq!(format_price(0.00003123, 8), "0.00003123");
        assert_eq!(format_price(-1234.5, 1), "-1,234.5");
    }

    #[test]
    fn test_format_change() {
        assert_eq!(format_change(2.5), "↑ +2.50%");
        assert_eq!(format_change(-0.126), "↓ -0.13%");
        assert_eq!(format_change(0.0), "↑ +0.00%");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("btcusdt"), "BTC");
        assert_eq!(display_name("ESXUSD"), "ESX");
        assert_eq!(display_name("RUNECOIN"), "RUNECOIN");
        assert_eq!(display_name("usdt"), "USDT");
    }
}
