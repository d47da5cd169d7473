//! Risk engine configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::TradingError;

use crate::{BreakerLimits, ExitLevelConfig, KellyConfig, VarMethod};

/// Risk management configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of equity lost if a stop is hit
    pub max_risk_per_trade: Decimal,
    /// Largest position value as a fraction of equity
    pub max_position_pct: Decimal,
    /// Fractional Kelly cap on position value
    pub kelly: KellyConfig,
    /// Closed trades needed before the Kelly cap applies
    pub min_trades_for_kelly: usize,
    /// Highest post-trade Herfindahl index allowed for an entry
    pub max_herfindahl: f64,
    /// Circuit breaker limits
    pub breaker: BreakerLimits,
    /// Stop and target placement
    pub exits: ExitLevelConfig,
    /// Confidence of the reported Value at Risk
    pub var_confidence: f64,
    pub var_method: VarMethod,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_risk_per_trade: dec!(0.01),
            max_position_pct: dec!(0.20),
            kelly: KellyConfig::default(),
            min_trades_for_kelly: 20,
            max_herfindahl: 0.3,
            breaker: BreakerLimits::default(),
            exits: ExitLevelConfig::default(),
            var_confidence: 0.95,
            var_method: VarMethod::Historical,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.max_risk_per_trade <= Decimal::ZERO || self.max_risk_per_trade >= Decimal::ONE {
            return Err(TradingError::Config(
                "risk.max_risk_per_trade must be in (0, 1)".into(),
            ));
        }
        if self.max_position_pct <= Decimal::ZERO || self.max_position_pct > Decimal::ONE {
            return Err(TradingError::Config(
                "risk.max_position_pct must be in (0, 1]".into(),
            ));
        }
        if !(self.max_herfindahl > 0.0 && self.max_herfindahl <= 1.0) {
            return Err(TradingError::Config(
                "risk.max_herfindahl must be in (0, 1]".into(),
            ));
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            return Err(TradingError::Config(
                "risk.var_confidence must be in (0, 1)".into(),
            ));
        }
        if self.kelly.multiplier <= 0.0 || self.kelly.cap <= 0.0 {
            return Err(TradingError::Config(
                "risk.kelly multiplier and cap must be positive".into(),
            ));
        }
        let limits = &self.breaker;
        for (name, value) in [
            ("max_portfolio_loss_pct", limits.max_portfolio_loss_pct),
            ("max_intraday_loss_pct", limits.max_intraday_loss_pct),
            ("max_position_loss_pct", limits.max_position_loss_pct),
        ] {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(TradingError::Config(format!(
                    "risk.breaker.{name} must be in (0, 1]"
                )));
            }
        }
        if self.exits.base_stop_pct <= 0.0 || self.exits.base_stop_pct >= 1.0 {
            return Err(TradingError::Config(
                "risk.exits.base_stop_pct must be in (0, 1)".into(),
            ));
        }
        if self.exits.base_take_pct <= 0.0 {
            return Err(TradingError::Config(
                "risk.exits.base_take_pct must be positive".into(),
            ));
        }
        if self.exits.min_scale <= 0.0 || self.exits.min_scale > self.exits.max_scale {
            return Err(TradingError::Config(
                "risk.exits scale bounds are inconsistent".into(),
            ));
        }
        if self.exits.base_stop_pct * self.exits.max_scale >= 1.0 {
            return Err(TradingError::Config(
                "risk.exits.base_stop_pct * max_scale must stay below 1".into(),
            ));
        }
        Ok(())
    }
}
