//! RSI Strategy.
//!
//! Long when RSI is oversold, short when overbought. The overbought level is
//! the mirror of the oversold level.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::SignalStrategy,
    types::{Bar, Signal, StrategyOutput, StrategyParams},
};

use crate::indicators::rsi;
use crate::params::{get_f64, get_period, ParamGrid};

/// Configuration for the RSI strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiConfig {
    /// RSI period
    pub period: usize,
    /// Oversold level (overbought is `100 - oversold`)
    pub oversold: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
        }
    }
}

impl RsiConfig {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.period < 2 {
            return Err(StrategyError::InvalidConfig(
                "RSI period must be at least 2".into(),
            ));
        }
        if self.oversold <= 0.0 || self.oversold >= 50.0 {
            return Err(StrategyError::InvalidConfig(
                "Oversold level must be between 0 and 50".into(),
            ));
        }
        Ok(())
    }

    pub fn from_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let defaults = Self::default();
        let config = Self {
            period: get_period(params, "period", defaults.period)?,
            oversold: get_f64(params, "oversold", defaults.oversold)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_params(&self) -> StrategyParams {
        [
            ("period".to_string(), self.period as f64),
            ("oversold".to_string(), self.oversold),
        ]
        .into_iter()
        .collect()
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .axis("period", [7.0, 14.0, 21.0])
            .axis("oversold", [20.0, 25.0, 30.0, 35.0])
    }

    pub fn overbought(&self) -> f64 {
        100.0 - self.oversold
    }
}

/// RSI Strategy.
#[derive(Debug, Clone)]
pub struct RsiStrategy {
    config: RsiConfig,
}

impl RsiStrategy {
    pub const NAME: &'static str = "rsi";

    pub fn new(config: RsiConfig) -> Self {
        Self { config }
    }
}

impl SignalStrategy for RsiStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Trades RSI overbought/oversold reversals"
    }

    fn evaluate(&self, history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
        if history.len() < self.lookback() {
            return Ok(StrategyOutput::neutral());
        }

        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let Some(value) = rsi(&closes, self.config.period) else {
            return Ok(StrategyOutput::neutral());
        };

        let oversold = self.config.oversold;
        let overbought = self.config.overbought();
        let (signal, confidence) = if value < oversold {
            (Signal::Long, (oversold - value) / oversold)
        } else if value > overbought {
            (Signal::Short, (value - overbought) / (100.0 - overbought))
        } else {
            (Signal::Flat, 0.0)
        };

        Ok(StrategyOutput::new(signal, confidence).with_detail("rsi", value))
    }

    fn params(&self) -> StrategyParams {
        self.config.to_params()
    }

    fn lookback(&self) -> usize {
        self.config.period + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar::flat(i as i64, *c))
            .collect()
    }

    fn strategy() -> RsiStrategy {
        RsiStrategy::new(RsiConfig {
            period: 5,
            oversold: 30.0,
        })
    }

    #[test]
    fn test_config_validation() {
        let config = RsiConfig {
            oversold: 60.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(RsiConfig::default().overbought(), 70.0);
    }

    #[test]
    fn test_oversold_goes_long() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        let output = strategy().evaluate(&bars(&closes)).unwrap();
        assert_eq!(output.signal, Signal::Long);
        assert!((output.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overbought_goes_short() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let output = strategy().evaluate(&bars(&closes)).unwrap();
        assert_eq!(output.signal, Signal::Short);
        assert_eq!(output.explanation["rsi"], 100.0);
    }

    #[test]
    fn test_choppy_market_is_flat() {
        let closes = [100.0, 101.0, 100.0, 101.0, 100.0, 101.0, 100.0];
        let output = strategy().evaluate(&bars(&closes)).unwrap();
        assert_eq!(output.signal, Signal::Flat);
    }
}
