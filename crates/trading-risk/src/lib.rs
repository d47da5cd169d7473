//! Risk engine.
//!
//! Provides:
//! - Fixed-fractional position sizing from entry and stop prices
//! - Fractional Kelly sizing from closed-trade statistics
//! - Value at Risk and Expected Shortfall estimation
//! - A sticky portfolio circuit breaker
//! - Concentration measurement and an entry gate
//! - Volatility-scaled stop-loss and take-profit levels

mod circuit_breaker;
mod concentration;
mod config;
mod exit_levels;
mod kelly;
mod risk_manager;
mod sizing;
mod var;

pub use circuit_breaker::{BreakerCheck, BreakerLimits, CircuitBreaker};
pub use concentration::{concentration_risk, ConcentrationGate, ConcentrationReport};
pub use config::RiskConfig;
pub use exit_levels::{realized_volatility, ExitLevelConfig, ExitLevels};
pub use kelly::{kelly_fraction, KellyConfig, TradeStats};
pub use risk_manager::{EntryBlock, EntryPlan, EntryRequest, RiskManager};
pub use sizing::position_size_shares;
pub use var::{conditional_var, value_at_risk, VarMethod};
