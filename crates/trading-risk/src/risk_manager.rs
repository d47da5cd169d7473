//! Unified risk manager used by the execution engine for entries.

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;
use trading_core::{convert::to_decimal, error::RiskError};

use crate::{
    position_size_shares, BreakerCheck, CircuitBreaker, ConcentrationGate, ExitLevels, RiskConfig,
    TradeStats,
};

/// Inputs for sizing one long entry.
#[derive(Debug, Clone)]
pub struct EntryRequest<'a> {
    /// Symbol to buy
    pub symbol: &'a str,
    /// Expected entry price
    pub entry: Decimal,
    /// Recent closes, oldest first
    pub closes: &'a [f64],
    /// Portfolio equity
    pub equity: Decimal,
    /// Available cash
    pub cash: Decimal,
    /// Market value of current positions
    pub position_values: &'a BTreeMap<String, Decimal>,
    /// Returns of closed trades, oldest first
    pub trade_returns: &'a [f64],
}

/// Approved entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPlan {
    /// Whole shares to buy
    pub shares: u64,
    /// Stop and target levels
    pub levels: ExitLevels,
}

/// Why an entry was not approved.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryBlock {
    /// Circuit breaker is tripped
    CircuitBreaker,
    /// Post-trade concentration would exceed the ceiling
    Concentration,
    /// Sizing came out at zero shares
    ZeroSize,
    /// Sizing inputs were invalid
    Invalid(RiskError),
}

/// Risk manager owning the breaker and the sizing rules.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    breaker: CircuitBreaker,
    gate: ConcentrationGate,
}

impl RiskManager {
    pub fn new(config: RiskConfig, initial_capital: Decimal) -> Self {
        let breaker = CircuitBreaker::new(config.breaker.clone(), initial_capital);
        let gate = ConcentrationGate::new(config.max_herfindahl);
        Self {
            config,
            breaker,
            gate,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run the circuit breaker against the current portfolio.
    pub fn check_breaker(
        &mut self,
        equity: Decimal,
        peak_equity: Decimal,
        position_losses: &BTreeMap<String, Decimal>,
    ) -> BreakerCheck {
        self.breaker.check(equity, peak_equity, position_losses)
    }

    /// Operator action: clear the circuit breaker.
    pub fn reset_breaker(&mut self) {
        self.breaker.reset();
    }

    /// Size a long entry.
    ///
    /// Shares come from the fixed-fractional rule, then are capped by
    /// fractional Kelly (once enough trades have closed), by the maximum
    /// position value and by available cash.
    pub fn plan_entry(&self, request: &EntryRequest<'_>) -> Result<EntryPlan, EntryBlock> {
        if self.breaker.is_triggered() {
            return Err(EntryBlock::CircuitBreaker);
        }

        let levels = ExitLevels::volatility_scaled(request.entry, request.closes, &self.config.exits);
        let mut shares = position_size_shares(
            request.equity,
            request.entry,
            levels.stop,
            self.config.max_risk_per_trade,
        )
        .map_err(EntryBlock::Invalid)?;

        let mut max_value = request.equity * self.config.max_position_pct;
        if let Some(kelly) = self.kelly_fraction(request.trade_returns) {
            max_value = max_value.min(request.equity * to_decimal(kelly));
        }
        max_value = max_value.min(request.cash);
        shares = shares.min(whole_shares(max_value, request.entry));

        if shares == 0 {
            return Err(EntryBlock::ZeroSize);
        }

        let value = Decimal::from(shares) * request.entry;
        if !self
            .gate
            .allows(request.position_values, request.symbol, value, request.equity)
        {
            return Err(EntryBlock::Concentration);
        }

        Ok(EntryPlan { shares, levels })
    }

    fn kelly_fraction(&self, trade_returns: &[f64]) -> Option<f64> {
        if trade_returns.len() < self.config.min_trades_for_kelly {
            return None;
        }
        let stats = TradeStats::from_returns(trade_returns)?;
        match stats.kelly(&self.config.kelly) {
            Ok(fraction) => Some(fraction),
            Err(e) => {
                debug!(error = %e, "Kelly cap skipped");
                None
            }
        }
    }
}

fn whole_shares(value: Decimal, price: Decimal) -> u64 {
    if price <= Decimal::ZERO || value <= Decimal::ZERO {
        return 0;
    }
    (value / price).floor().to_u64().unwrap_or(0)
}
