//! Volatility-scaled stop-loss and take-profit levels.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::convert::to_decimal;

/// Configuration for exit levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitLevelConfig {
    /// Stop distance at reference volatility, as a fraction of entry
    pub base_stop_pct: f64,
    /// Profit target distance at reference volatility
    pub base_take_pct: f64,
    /// Bars used to measure realized volatility
    pub vol_lookback: usize,
    /// Per-bar volatility at which the base distances apply
    pub reference_vol: f64,
    /// Lower clamp on the volatility scale
    pub min_scale: f64,
    /// Upper clamp on the volatility scale
    pub max_scale: f64,
}

impl Default for ExitLevelConfig {
    fn default() -> Self {
        Self {
            base_stop_pct: 0.02,
            base_take_pct: 0.06,
            vol_lookback: 20,
            reference_vol: 0.01,
            min_scale: 0.5,
            max_scale: 2.0,
        }
    }
}

/// Standard deviation of simple returns over the last `lookback` returns.
pub fn realized_volatility(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback < 2 || closes.len() < lookback + 1 {
        return None;
    }
    let window = &closes[closes.len() - lookback - 1..];
    let returns: Vec<f64> = window
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Stop and target prices for a long entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitLevels {
    /// Protective stop
    pub stop: Decimal,
    /// Profit target
    pub take: Decimal,
    /// Volatility scale applied to the base distances
    pub scale: f64,
}

impl ExitLevels {
    /// Widen exits in volatile markets and tighten them in quiet ones.
    /// With too little history the base distances are used as is.
    pub fn volatility_scaled(entry: Decimal, closes: &[f64], config: &ExitLevelConfig) -> Self {
        let scale = match realized_volatility(closes, config.vol_lookback) {
            Some(vol) if config.reference_vol > 0.0 => {
                (vol / config.reference_vol).clamp(config.min_scale, config.max_scale)
            }
            _ => 1.0,
        };

        let stop_distance = to_decimal(config.base_stop_pct * scale).round_dp(6);
        let take_distance = to_decimal(config.base_take_pct * scale).round_dp(6);
        Self {
            stop: entry * (Decimal::ONE - stop_distance),
            take: entry * (Decimal::ONE + take_distance),
            scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_short_history_uses_base() {
        let levels = ExitLevels::volatility_scaled(dec!(100), &[100.0, 101.0], &Default::default());
        assert_eq!(levels.scale, 1.0);
        assert_eq!(levels.stop, dec!(98));
        assert_eq!(levels.take, dec!(106));
    }

    #[test]
    fn test_scale_is_clamped() {
        let config = ExitLevelConfig {
            vol_lookback: 5,
            ..Default::default()
        };
        let quiet = vec![100.0; 10];
        let levels = ExitLevels::volatility_scaled(dec!(100), &quiet, &config);
        assert_eq!(levels.scale, 0.5);
        assert_eq!(levels.stop, dec!(99));

        let wild = [100.0, 120.0, 90.0, 130.0, 80.0, 140.0];
        let levels = ExitLevels::volatility_scaled(dec!(100), &wild, &config);
        assert_eq!(levels.scale, 2.0);
        assert_eq!(levels.take, dec!(112));
    }

    #[test]
    fn test_realized_volatility() {
        assert_eq!(realized_volatility(&[100.0, 101.0], 5), None);
        let vol = realized_volatility(&[100.0, 102.0, 100.0, 102.0, 100.0], 4).unwrap();
        assert!(vol > 0.015 && vol < 0.025);
    }
}
