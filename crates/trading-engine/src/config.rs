//! Execution engine configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::TradingError;
use trading_ensemble::EnsembleConfig;
use trading_risk::RiskConfig;
use trading_tuner::TunerConfig;

/// One profit-taking level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitLevel {
    /// Unrealized gain that triggers the level (0.015 = +1.5%)
    pub gain: f64,
    /// Fraction of the original allocation sold at this level
    pub fraction: f64,
}

impl ProfitLevel {
    pub const fn new(gain: f64, fraction: f64) -> Self {
        Self { gain, fraction }
    }
}

/// Per-iteration execution rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Consecutive long decisions required before entering
    pub confirm_bars: u32,
    /// Bars a position may be held before the time exit applies
    pub max_hold_bars: u64,
    /// Gain below which a stale position is closed
    pub time_exit_min_gain: f64,
    /// Profit-taking levels, ascending by gain
    pub profit_levels: Vec<ProfitLevel>,
    /// Bars kept per symbol
    pub history_capacity: usize,
    /// Strategy evaluations running at once
    pub worker_threads: usize,
    /// Per-evaluation timeout in milliseconds
    pub strategy_timeout_ms: u64,
    /// Stop after this many iterations
    pub max_iterations: Option<u64>,
    /// Write every decision to the event log
    pub log_decisions: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            confirm_bars: 2,
            max_hold_bars: 20,
            time_exit_min_gain: 0.01,
            profit_levels: vec![
                ProfitLevel::new(0.015, 0.5),
                ProfitLevel::new(0.03, 0.25),
                ProfitLevel::new(0.05, 0.25),
            ],
            history_capacity: 500,
            worker_threads: 4,
            strategy_timeout_ms: 5000,
            max_iterations: None,
            log_decisions: true,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.confirm_bars == 0 {
            return Err(TradingError::Config(
                "execution.confirm_bars must be at least 1".into(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(TradingError::Config(
                "execution.worker_threads must be at least 1".into(),
            ));
        }
        if self.strategy_timeout_ms == 0 {
            return Err(TradingError::Config(
                "execution.strategy_timeout_ms must be positive".into(),
            ));
        }
        if self.history_capacity < 2 {
            return Err(TradingError::Config(
                "execution.history_capacity must be at least 2".into(),
            ));
        }

        let mut previous_gain = 0.0;
        let mut total = 0.0;
        for level in &self.profit_levels {
            if level.gain <= previous_gain {
                return Err(TradingError::Config(
                    "execution.profit_levels gains must be positive and ascending".into(),
                ));
            }
            if !(level.fraction > 0.0 && level.fraction <= 1.0) {
                return Err(TradingError::Config(
                    "execution.profit_levels fractions must be in (0, 1]".into(),
                ));
            }
            previous_gain = level.gain;
            total += level.fraction;
        }
        if total > 1.0 + 1e-9 {
            return Err(TradingError::Config(
                "execution.profit_levels fractions must sum to at most 1".into(),
            ));
        }
        Ok(())
    }
}

/// Everything the execution engine needs to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Starting cash, used for the breaker and the report
    pub initial_capital: Decimal,
    /// Registered strategy names
    pub strategies: Vec<String>,
    pub execution: ExecutionConfig,
    pub ensemble: EnsembleConfig,
    pub risk: RiskConfig,
    pub tuner: TunerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            strategies: vec![
                "ma_crossover".to_string(),
                "mean_reversion".to_string(),
                "momentum".to_string(),
                "rsi".to_string(),
            ],
            execution: ExecutionConfig::default(),
            ensemble: EnsembleConfig::default(),
            risk: RiskConfig::default(),
            tuner: TunerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(TradingError::Config(
                "initial capital must be positive".into(),
            ));
        }
        self.execution.validate()?;
        self.ensemble.validate()?;
        self.risk.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_profit_levels_must_ascend() {
        let mut config = ExecutionConfig::default();
        config.profit_levels = vec![ProfitLevel::new(0.03, 0.5), ProfitLevel::new(0.015, 0.5)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profit_fractions_capped() {
        let mut config = ExecutionConfig::default();
        config.profit_levels = vec![ProfitLevel::new(0.01, 0.7), ProfitLevel::new(0.02, 0.7)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = EngineConfig::default();
        config.execution.worker_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ExecutionConfig = serde_json::from_str(r#"{"confirm_bars": 3}"#).unwrap();
        assert_eq!(config.confirm_bars, 3);
        assert_eq!(config.max_hold_bars, 20);
        assert_eq!(config.profit_levels.len(), 3);
    }
}
