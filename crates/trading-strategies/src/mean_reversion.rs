//! Mean Reversion Strategy.
//!
//! Measures how far the close sits from its rolling mean in standard
//! deviations. Stretched below the mean is a long, stretched above is a short.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::SignalStrategy,
    types::{Bar, Signal, StrategyOutput, StrategyParams},
};

use crate::indicators::mean_std;
use crate::params::{get_f64, get_period, ParamGrid};

/// Configuration for the Mean Reversion strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanReversionConfig {
    /// Rolling window for mean and standard deviation
    pub lookback: usize,
    /// Absolute z-score needed to enter
    pub entry_z: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            entry_z: 2.0,
        }
    }
}

impl MeanReversionConfig {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.lookback < 2 {
            return Err(StrategyError::InvalidConfig(
                "Lookback must be at least 2".into(),
            ));
        }
        if self.entry_z <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Entry z-score must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn from_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let defaults = Self::default();
        let config = Self {
            lookback: get_period(params, "lookback", defaults.lookback)?,
            entry_z: get_f64(params, "entry_z", defaults.entry_z)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_params(&self) -> StrategyParams {
        [
            ("lookback".to_string(), self.lookback as f64),
            ("entry_z".to_string(), self.entry_z),
        ]
        .into_iter()
        .collect()
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .axis("lookback", [10.0, 20.0, 30.0])
            .axis("entry_z", [1.5, 2.0, 2.5])
    }
}

/// Mean Reversion Strategy.
#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
}

impl MeanReversionStrategy {
    pub const NAME: &'static str = "mean_reversion";

    pub fn new(config: MeanReversionConfig) -> Self {
        Self { config }
    }
}

impl SignalStrategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Fades moves that stretch too far from the rolling mean"
    }

    fn evaluate(&self, history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
        if history.len() < self.lookback() {
            return Ok(StrategyOutput::neutral());
        }

        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let Some((mean, std)) = mean_std(&closes, self.config.lookback) else {
            return Ok(StrategyOutput::neutral());
        };
        let Some(close) = closes.last().copied() else {
            return Ok(StrategyOutput::neutral());
        };
        if std <= f64::EPSILON {
            return Ok(StrategyOutput::neutral().with_detail("mean", mean));
        }

        let z = (close - mean) / std;
        let entry_z = self.config.entry_z;
        let signal = if z <= -entry_z {
            Signal::Long
        } else if z >= entry_z {
            Signal::Short
        } else {
            Signal::Flat
        };
        let confidence = match signal {
            Signal::Flat => 0.0,
            _ => z.abs() / (2.0 * entry_z),
        };

        Ok(StrategyOutput::new(signal, confidence)
            .with_detail("mean", mean)
            .with_detail("std", std)
            .with_detail("z_score", z))
    }

    fn params(&self) -> StrategyParams {
        self.config.to_params()
    }

    fn lookback(&self) -> usize {
        self.config.lookback
    }
}
