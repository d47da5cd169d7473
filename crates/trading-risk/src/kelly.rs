//! Fractional Kelly sizing.

use serde::{Deserialize, Serialize};
use trading_core::error::RiskError;

/// Fractional Kelly parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
    /// Fraction of the full Kelly bet to take
    pub multiplier: f64,
    /// Upper bound on the resulting fraction of equity
    pub cap: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            multiplier: 0.5,
            cap: 0.25,
        }
    }
}

/// Fraction of equity to commit, `min(max(0, (b*p - q) / b) * multiplier, cap)`
/// with `b = avg_win / avg_loss`.
pub fn kelly_fraction(
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    config: &KellyConfig,
) -> Result<f64, RiskError> {
    if !(0.0..=1.0).contains(&win_rate) {
        return Err(RiskError::InvalidInput(format!(
            "win rate must be in [0, 1], got {win_rate}"
        )));
    }
    if !(avg_win > 0.0 && avg_win.is_finite()) {
        return Err(RiskError::InvalidInput(format!(
            "average win must be positive, got {avg_win}"
        )));
    }
    if !(avg_loss > 0.0 && avg_loss.is_finite()) {
        return Err(RiskError::InvalidInput(format!(
            "average loss must be positive, got {avg_loss}"
        )));
    }

    let b = avg_win / avg_loss;
    let raw = (b * win_rate - (1.0 - win_rate)) / b;
    if raw <= 0.0 {
        return Ok(0.0);
    }
    Ok((raw * config.multiplier).min(config.cap))
}

/// Win/loss statistics of closed trades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeStats {
    /// Number of trades
    pub count: usize,
    /// Fraction of trades with a positive return
    pub win_rate: f64,
    /// Mean return of winning trades
    pub avg_win: f64,
    /// Mean absolute return of losing trades
    pub avg_loss: f64,
}

impl TradeStats {
    /// Summarize trade returns. Breakeven trades count as losses of zero size.
    pub fn from_returns(returns: &[f64]) -> Option<Self> {
        if returns.is_empty() {
            return None;
        }
        let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|r| *r <= 0.0).collect();

        Some(Self {
            count: returns.len(),
            win_rate: wins.len() as f64 / returns.len() as f64,
            avg_win: mean(&wins),
            avg_loss: mean(&losses).abs(),
        })
    }

    /// Fractional Kelly for these statistics. A record without wins sizes to
    /// zero and a record without losses sizes to the cap.
    pub fn kelly(&self, config: &KellyConfig) -> Result<f64, RiskError> {
        if self.avg_win <= 0.0 {
            return Ok(0.0);
        }
        if self.avg_loss <= 0.0 {
            return Ok(config.cap);
        }
        kelly_fraction(self.win_rate, self.avg_win, self.avg_loss, config)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kelly_half_and_cap() {
        // b = 2, p = 0.6: raw = (1.2 - 0.4) / 2 = 0.4, half = 0.2
        let f = kelly_fraction(0.6, 2.0, 1.0, &KellyConfig::default()).unwrap();
        assert!((f - 0.2).abs() < 1e-12);

        // raw = (3 * 0.8 - 0.2) / 3 = 0.7333, half = 0.3667 -> capped
        let f = kelly_fraction(0.8, 3.0, 1.0, &KellyConfig::default()).unwrap();
        assert_eq!(f, 0.25);
    }

    #[test]
    fn test_negative_edge_is_zero() {
        let f = kelly_fraction(0.3, 1.0, 1.0, &KellyConfig::default()).unwrap();
        assert_eq!(f, 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        let config = KellyConfig::default();
        assert!(kelly_fraction(1.2, 1.0, 1.0, &config).is_err());
        assert!(kelly_fraction(0.5, 0.0, 1.0, &config).is_err());
        assert!(kelly_fraction(0.5, 1.0, -1.0, &config).is_err());
    }

    #[test]
    fn test_trade_stats() {
        let stats = TradeStats::from_returns(&[0.02, -0.01, 0.04, -0.03]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.win_rate, 0.5);
        assert!((stats.avg_win - 0.03).abs() < 1e-12);
        assert!((stats.avg_loss - 0.02).abs() < 1e-12);
        assert!(TradeStats::from_returns(&[]).is_none());

        let all_wins = TradeStats::from_returns(&[0.01, 0.02]).unwrap();
        assert_eq!(all_wins.kelly(&KellyConfig::default()).unwrap(), 0.25);

        let all_losses = TradeStats::from_returns(&[-0.01, -0.02]).unwrap();
        assert_eq!(all_losses.kelly(&KellyConfig::default()).unwrap(), 0.0);
    }
}
