//! Reference signal strategies.
//!
//! Every strategy implements [`trading_core::SignalStrategy`] and is built
//! from a flat parameter map so the weekly tuner can rebuild it with new
//! values:
//! - Moving Average Crossover
//! - Mean Reversion (rolling z-score)
//! - Momentum (rate of change)
//! - RSI overbought/oversold

mod indicators;
mod ma_crossover;
mod mean_reversion;
mod momentum;
mod params;
mod registry;
mod rsi_strategy;

pub use ma_crossover::{MACrossoverConfig, MACrossoverStrategy};
pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use momentum::{MomentumConfig, MomentumStrategy};
pub use params::ParamGrid;
pub use registry::{StrategyInfo, StrategyRegistry};
pub use rsi_strategy::{RsiConfig, RsiStrategy};
