//! Ensemble configuration.

use serde::{Deserialize, Serialize};
use trading_core::TradingError;

/// Configuration for the ensemble weighting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Weight given to a newly registered strategy
    pub initial_weight: f64,
    /// Lower bound for raw and normalized weights
    pub weight_floor: f64,
    /// Base learning rate
    pub eta: f64,
    /// Number of updates over which the learning rate halves
    pub eta_decay_updates: f64,
    /// Score at or above which the decision is long
    pub buy_threshold: f64,
    /// Score at or below the negative of which the decision is short
    pub sell_threshold: f64,
    /// Return scale used when squashing returns into rewards
    pub reward_scale: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            initial_weight: 1.0,
            weight_floor: 0.01,
            eta: 0.5,
            eta_decay_updates: 1000.0,
            buy_threshold: 0.3,
            sell_threshold: 0.3,
            reward_scale: 0.002,
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<(), TradingError> {
        if !(self.weight_floor > 0.0 && self.weight_floor < 1.0) {
            return Err(TradingError::Config(
                "ensemble.weight_floor must be in (0, 1)".into(),
            ));
        }
        if self.initial_weight < self.weight_floor {
            return Err(TradingError::Config(
                "ensemble.initial_weight must be at least the weight floor".into(),
            ));
        }
        if self.eta <= 0.0 || !self.eta.is_finite() {
            return Err(TradingError::Config(
                "ensemble.eta must be positive".into(),
            ));
        }
        if self.eta_decay_updates <= 0.0 {
            return Err(TradingError::Config(
                "ensemble.eta_decay_updates must be positive".into(),
            ));
        }
        if self.buy_threshold <= 0.0 || self.sell_threshold <= 0.0 {
            return Err(TradingError::Config(
                "ensemble thresholds must be positive".into(),
            ));
        }
        if self.reward_scale <= 0.0 {
            return Err(TradingError::Config(
                "ensemble.reward_scale must be positive".into(),
            ));
        }
        Ok(())
    }
}
