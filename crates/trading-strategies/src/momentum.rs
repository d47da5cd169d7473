//! Momentum Strategy.
//!
//! Follows the rate of change over a lookback window.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::SignalStrategy,
    types::{Bar, Signal, StrategyOutput, StrategyParams},
};

use crate::indicators::rate_of_change;
use crate::params::{get_f64, get_period, ParamGrid};

/// Configuration for the Momentum strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Bars over which the rate of change is measured
    pub lookback: usize,
    /// Minimum absolute rate of change to generate a signal
    pub min_momentum: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback: 10,
            min_momentum: 0.01,
        }
    }
}

impl MomentumConfig {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.min_momentum <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Minimum momentum must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn from_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let defaults = Self::default();
        let config = Self {
            lookback: get_period(params, "lookback", defaults.lookback)?,
            min_momentum: get_f64(params, "min_momentum", defaults.min_momentum)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_params(&self) -> StrategyParams {
        [
            ("lookback".to_string(), self.lookback as f64),
            ("min_momentum".to_string(), self.min_momentum),
        ]
        .into_iter()
        .collect()
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .axis("lookback", [5.0, 10.0, 20.0])
            .axis("min_momentum", [0.005, 0.01, 0.02])
    }
}

/// Momentum Strategy.
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    config: MomentumConfig,
}

impl MomentumStrategy {
    pub const NAME: &'static str = "momentum";

    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }
}

impl SignalStrategy for MomentumStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Follows strong moves measured by rate of change"
    }

    fn evaluate(&self, history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
        if history.len() < self.lookback() {
            return Ok(StrategyOutput::neutral());
        }

        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let Some(roc) = rate_of_change(&closes, self.config.lookback) else {
            return Ok(StrategyOutput::neutral());
        };

        let min = self.config.min_momentum;
        let signal = if roc >= min {
            Signal::Long
        } else if roc <= -min {
            Signal::Short
        } else {
            Signal::Flat
        };
        let confidence = match signal {
            Signal::Flat => 0.0,
            _ => roc.abs() / (3.0 * min),
        };

        Ok(StrategyOutput::new(signal, confidence).with_detail("rate_of_change", roc))
    }

    fn params(&self) -> StrategyParams {
        self.config.to_params()
    }

    fn lookback(&self) -> usize {
        self.config.lookback + 1
    }
}
