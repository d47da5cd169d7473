//! Strategy registry: a static table from name to constructor.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trading_core::{error::StrategyError, traits::SignalStrategy, StrategyParams, TunedParams};

use crate::{
    MACrossoverConfig, MACrossoverStrategy, MeanReversionConfig, MeanReversionStrategy,
    MomentumConfig, MomentumStrategy, ParamGrid, RsiConfig, RsiStrategy,
};

type Constructor = fn(&StrategyParams) -> Result<Arc<dyn SignalStrategy>, StrategyError>;

struct Entry {
    name: &'static str,
    description: &'static str,
    default_params: fn() -> StrategyParams,
    grid: fn() -> ParamGrid,
    build: Constructor,
}

const ENTRIES: &[Entry] = &[
    Entry {
        name: MACrossoverStrategy::NAME,
        description: "Trend following on the spread between a fast and a slow moving average",
        default_params: ma_crossover_defaults,
        grid: MACrossoverConfig::param_grid,
        build: build_ma_crossover,
    },
    Entry {
        name: MeanReversionStrategy::NAME,
        description: "Fades moves that stretch too far from the rolling mean",
        default_params: mean_reversion_defaults,
        grid: MeanReversionConfig::param_grid,
        build: build_mean_reversion,
    },
    Entry {
        name: MomentumStrategy::NAME,
        description: "Follows strong moves measured by rate of change",
        default_params: momentum_defaults,
        grid: MomentumConfig::param_grid,
        build: build_momentum,
    },
    Entry {
        name: RsiStrategy::NAME,
        description: "Trades RSI overbought/oversold reversals",
        default_params: rsi_defaults,
        grid: RsiConfig::param_grid,
        build: build_rsi,
    },
];

fn ma_crossover_defaults() -> StrategyParams {
    MACrossoverConfig::default().to_params()
}

fn build_ma_crossover(params: &StrategyParams) -> Result<Arc<dyn SignalStrategy>, StrategyError> {
    let config = MACrossoverConfig::from_params(params)?;
    Ok(Arc::new(MACrossoverStrategy::new(config)))
}

fn mean_reversion_defaults() -> StrategyParams {
    MeanReversionConfig::default().to_params()
}

fn build_mean_reversion(
    params: &StrategyParams,
) -> Result<Arc<dyn SignalStrategy>, StrategyError> {
    let config = MeanReversionConfig::from_params(params)?;
    Ok(Arc::new(MeanReversionStrategy::new(config)))
}

fn momentum_defaults() -> StrategyParams {
    MomentumConfig::default().to_params()
}

fn build_momentum(params: &StrategyParams) -> Result<Arc<dyn SignalStrategy>, StrategyError> {
    let config = MomentumConfig::from_params(params)?;
    Ok(Arc::new(MomentumStrategy::new(config)))
}

fn rsi_defaults() -> StrategyParams {
    RsiConfig::default().to_params()
}

fn build_rsi(params: &StrategyParams) -> Result<Arc<dyn SignalStrategy>, StrategyError> {
    let config = RsiConfig::from_params(params)?;
    Ok(Arc::new(RsiStrategy::new(config)))
}

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy name
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Default parameters
    pub default_params: StrategyParams,
    /// Values explored by the weekly tuner
    pub grid: ParamGrid,
}

/// Registry for available trading strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyRegistry;

impl StrategyRegistry {
    /// Create a registry over all built-in strategies.
    pub fn new() -> Self {
        Self
    }

    fn entry(name: &str) -> Result<&'static Entry, StrategyError> {
        ENTRIES
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))
    }

    /// List all available strategies.
    pub fn list(&self) -> Vec<StrategyInfo> {
        ENTRIES
            .iter()
            .map(|e| StrategyInfo {
                name: e.name.to_string(),
                description: e.description.to_string(),
                default_params: (e.default_params)(),
                grid: (e.grid)(),
            })
            .collect()
    }

    /// Names of all registered strategies.
    pub fn names(&self) -> Vec<&'static str> {
        ENTRIES.iter().map(|e| e.name).collect()
    }

    /// Check if a strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        ENTRIES.iter().any(|e| e.name == name)
    }

    pub fn default_params(&self, name: &str) -> Result<StrategyParams, StrategyError> {
        Ok((Self::entry(name)?.default_params)())
    }

    /// Tuning grid for a strategy.
    pub fn param_grid(&self, name: &str) -> Result<ParamGrid, StrategyError> {
        Ok((Self::entry(name)?.grid)())
    }

    /// Build a strategy. `params` is overlaid on the defaults, so a partial
    /// map only changes the parameters it names.
    pub fn build(
        &self,
        name: &str,
        params: &StrategyParams,
    ) -> Result<Arc<dyn SignalStrategy>, StrategyError> {
        let entry = Self::entry(name)?;
        let mut merged = (entry.default_params)();
        merged.extend(params.iter().map(|(k, v)| (k.clone(), *v)));
        (entry.build)(&merged)
    }

    /// Build every named strategy, using tuned parameters when present.
    pub fn build_all(
        &self,
        names: &[String],
        tuned: &TunedParams,
    ) -> Result<Vec<Arc<dyn SignalStrategy>>, StrategyError> {
        names
            .iter()
            .map(|name| {
                let params = tuned.get(name).cloned().unwrap_or_default();
                self.build(name, &params)
            })
            .collect()
    }
}
