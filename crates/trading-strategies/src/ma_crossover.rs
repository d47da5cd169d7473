//! Moving Average Crossover Strategy.
//!
//! Goes long while the fast SMA sits above the slow SMA by more than the
//! threshold and short while it sits below by more than the threshold.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::SignalStrategy,
    types::{Bar, Signal, StrategyOutput, StrategyParams},
};

use crate::indicators::sma;
use crate::params::{get_f64, get_period, ParamGrid};

/// Configuration for the MA Crossover strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MACrossoverConfig {
    /// Fast moving average period
    pub fast_period: usize,
    /// Slow moving average period
    pub slow_period: usize,
    /// Minimum relative spread to generate a signal
    pub signal_threshold: f64,
}

impl Default for MACrossoverConfig {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
            signal_threshold: 0.001, // 0.1%
        }
    }
}

impl MACrossoverConfig {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.fast_period >= self.slow_period {
            return Err(StrategyError::InvalidConfig(
                "Fast period must be less than slow period".into(),
            ));
        }
        if self.signal_threshold < 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Signal threshold must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// Read a config from a flat parameter map, falling back to defaults.
    pub fn from_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let defaults = Self::default();
        let config = Self {
            fast_period: get_period(params, "fast_period", defaults.fast_period)?,
            slow_period: get_period(params, "slow_period", defaults.slow_period)?,
            signal_threshold: get_f64(params, "signal_threshold", defaults.signal_threshold)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_params(&self) -> StrategyParams {
        [
            ("fast_period".to_string(), self.fast_period as f64),
            ("slow_period".to_string(), self.slow_period as f64),
            ("signal_threshold".to_string(), self.signal_threshold),
        ]
        .into_iter()
        .collect()
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .axis("fast_period", [5.0, 10.0, 15.0])
            .axis("slow_period", [20.0, 30.0, 50.0])
    }
}

/// Moving Average Crossover Strategy.
#[derive(Debug, Clone)]
pub struct MACrossoverStrategy {
    config: MACrossoverConfig,
}

impl MACrossoverStrategy {
    pub const NAME: &'static str = "ma_crossover";

    /// Create a new MA Crossover strategy.
    pub fn new(config: MACrossoverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MACrossoverConfig {
        &self.config
    }
}

impl SignalStrategy for MACrossoverStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Trend following on the spread between a fast and a slow moving average"
    }

    fn evaluate(&self, history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
        if history.len() < self.lookback() {
            return Ok(StrategyOutput::neutral());
        }

        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let (Some(fast), Some(slow)) = (
            sma(&closes, self.config.fast_period),
            sma(&closes, self.config.slow_period),
        ) else {
            return Ok(StrategyOutput::neutral());
        };
        if slow == 0.0 {
            return Ok(StrategyOutput::neutral());
        }

        let spread = (fast - slow) / slow;
        let threshold = self.config.signal_threshold;
        let signal = if spread > threshold {
            Signal::Long
        } else if spread < -threshold {
            Signal::Short
        } else {
            Signal::Flat
        };

        // A 2% spread counts as full conviction
        let confidence = match signal {
            Signal::Flat => 0.0,
            _ => spread.abs() / 0.02,
        };

        Ok(StrategyOutput::new(signal, confidence)
            .with_detail("fast_ma", fast)
            .with_detail("slow_ma", slow)
            .with_detail("spread", spread))
    }

    fn params(&self) -> StrategyParams {
        self.config.to_params()
    }

    fn lookback(&self) -> usize {
        self.config.slow_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar::flat(i as i64 * 60_000, *c))
            .collect()
    }

    fn strategy() -> MACrossoverStrategy {
        MACrossoverStrategy::new(MACrossoverConfig {
            fast_period: 3,
            slow_period: 6,
            signal_threshold: 0.001,
        })
    }

    #[test]
    fn test_config_validation() {
        let config = MACrossoverConfig {
            fast_period: 30,
            slow_period: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(MACrossoverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_params_round_trip() {
        let config = MACrossoverConfig::default();
        assert_eq!(MACrossoverConfig::from_params(&config.to_params()).unwrap(), config);

        let partial: StrategyParams = [("fast_period".to_string(), 5.0)].into_iter().collect();
        let config = MACrossoverConfig::from_params(&partial).unwrap();
        assert_eq!(config.fast_period, 5);
        assert_eq!(config.slow_period, 30);
    }

    #[test]
    fn test_short_history_is_neutral() {
        let output = strategy().evaluate(&bars(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(output, StrategyOutput::neutral());
    }

    #[test]
    fn test_uptrend_goes_long() {
        let output = strategy()
            .evaluate(&bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]))
            .unwrap();
        assert_eq!(output.signal, Signal::Long);
        assert!(output.confidence > 0.0);
        assert!(output.explanation.contains_key("spread"));
    }

    #[test]
    fn test_downtrend_goes_short() {
        let output = strategy()
            .evaluate(&bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]))
            .unwrap();
        assert_eq!(output.signal, Signal::Short);
    }

    #[test]
    fn test_flat_market_is_flat() {
        let output = strategy().evaluate(&bars(&[100.0; 6])).unwrap();
        assert_eq!(output.signal, Signal::Flat);
        assert_eq!(output.confidence, 0.0);
    }
}
