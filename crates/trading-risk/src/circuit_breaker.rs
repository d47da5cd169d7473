//! Portfolio circuit breaker.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Loss limits, each a fraction (0.15 = 15%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerLimits {
    /// Maximum loss from initial capital
    pub max_portfolio_loss_pct: Decimal,
    /// Maximum drawdown from the running equity peak
    pub max_intraday_loss_pct: Decimal,
    /// Maximum loss of any single position from its entry price
    pub max_position_loss_pct: Decimal,
}

impl Default for BreakerLimits {
    fn default() -> Self {
        Self {
            max_portfolio_loss_pct: dec!(0.15),
            max_intraday_loss_pct: dec!(0.05),
            max_position_loss_pct: dec!(0.10),
        }
    }
}

/// Result of a breaker check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerCheck {
    /// Whether new entries are blocked
    pub triggered: bool,
    /// Reason of the first trip
    pub reason: Option<String>,
    /// True only on the check that tripped the breaker
    pub newly_triggered: bool,
}

/// Sticky circuit breaker: once tripped it stays tripped with its first
/// reason until [`reset`](Self::reset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    limits: BreakerLimits,
    initial_capital: Decimal,
    triggered: bool,
    reason: Option<String>,
}

impl CircuitBreaker {
    pub fn new(limits: BreakerLimits, initial_capital: Decimal) -> Self {
        Self {
            limits,
            initial_capital,
            triggered: false,
            reason: None,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn limits(&self) -> &BreakerLimits {
        &self.limits
    }

    /// Evaluate the limits against the current portfolio.
    pub fn check(
        &mut self,
        current_equity: Decimal,
        peak_equity: Decimal,
        position_losses: &BTreeMap<String, Decimal>,
    ) -> BreakerCheck {
        if self.triggered {
            return self.status(false);
        }

        if let Some(reason) = self.breach(current_equity, peak_equity, position_losses) {
            warn!(%reason, equity = %current_equity, "Circuit breaker triggered");
            self.triggered = true;
            self.reason = Some(reason);
            return self.status(true);
        }

        self.status(false)
    }

    /// Operator action: clear the breaker.
    pub fn reset(&mut self) {
        self.triggered = false;
        self.reason = None;
    }

    fn status(&self, newly_triggered: bool) -> BreakerCheck {
        BreakerCheck {
            triggered: self.triggered,
            reason: self.reason.clone(),
            newly_triggered,
        }
    }

    fn breach(
        &self,
        current_equity: Decimal,
        peak_equity: Decimal,
        position_losses: &BTreeMap<String, Decimal>,
    ) -> Option<String> {
        if self.initial_capital > Decimal::ZERO {
            let loss = (self.initial_capital - current_equity) / self.initial_capital;
            if loss >= self.limits.max_portfolio_loss_pct {
                return Some(format!(
                    "portfolio loss {:.2}% reached limit {:.2}%",
                    loss * dec!(100),
                    self.limits.max_portfolio_loss_pct * dec!(100)
                ));
            }
        }

        if peak_equity > Decimal::ZERO {
            let drawdown = (peak_equity - current_equity) / peak_equity;
            if drawdown >= self.limits.max_intraday_loss_pct {
                return Some(format!(
                    "drawdown {:.2}% from peak reached limit {:.2}%",
                    drawdown * dec!(100),
                    self.limits.max_intraday_loss_pct * dec!(100)
                ));
            }
        }

        position_losses
            .iter()
            .find(|(_, loss)| **loss >= self.limits.max_position_loss_pct)
            .map(|(symbol, loss)| {
                format!(
                    "{symbol} position loss {:.2}% reached limit {:.2}%",
                    *loss * dec!(100),
                    self.limits.max_position_loss_pct * dec!(100)
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(portfolio: Decimal) -> CircuitBreaker {
        CircuitBreaker::new(
            BreakerLimits {
                max_portfolio_loss_pct: portfolio,
                max_intraday_loss_pct: dec!(0.50),
                max_position_loss_pct: dec!(0.50),
            },
            dec!(100000),
        )
    }

    #[test]
    fn test_trips_exactly_at_limit_trace() {
        let mut breaker = breaker(dec!(0.15));
        let no_losses = BTreeMap::new();
        let trace = [dec!(100000), dec!(95000), dec!(90000), dec!(84000)];

        let mut tripped_at = None;
        for (i, equity) in trace.iter().enumerate() {
            let check = breaker.check(*equity, dec!(100000), &no_losses);
            if check.newly_triggered {
                tripped_at = Some(i);
            }
        }
        assert_eq!(tripped_at, Some(3));
        assert!(breaker.is_triggered());
    }

    #[test]
    fn test_limit_is_inclusive() {
        let mut breaker = breaker(dec!(0.15));
        let check = breaker.check(dec!(85000), dec!(100000), &BTreeMap::new());
        assert!(check.triggered);
        assert!(check.reason.unwrap().contains("portfolio loss"));
    }

    #[test]
    fn test_sticky_until_reset() {
        let mut breaker = breaker(dec!(0.15));
        assert!(breaker.check(dec!(80000), dec!(100000), &BTreeMap::new()).newly_triggered);

        let check = breaker.check(dec!(120000), dec!(120000), &BTreeMap::new());
        assert!(check.triggered);
        assert!(!check.newly_triggered);
        assert!(breaker.reason().unwrap().contains("portfolio loss"));

        breaker.reset();
        assert!(!breaker.is_triggered());
        assert!(!breaker.check(dec!(120000), dec!(120000), &BTreeMap::new()).triggered);
    }

    #[test]
    fn test_drawdown_from_peak() {
        let mut breaker = CircuitBreaker::new(BreakerLimits::default(), dec!(100000));
        let check = breaker.check(dec!(104500), dec!(110000), &BTreeMap::new());
        assert!(check.triggered);
        assert!(check.reason.unwrap().contains("drawdown"));
    }

    #[test]
    fn test_single_position_loss() {
        let mut breaker = CircuitBreaker::new(BreakerLimits::default(), dec!(100000));
        let mut losses = BTreeMap::new();
        losses.insert("AAPL".to_string(), dec!(0.02));
        losses.insert("TSLA".to_string(), dec!(0.12));
        let check = breaker.check(dec!(100000), dec!(100000), &losses);
        assert!(check.triggered);
        assert!(check.reason.unwrap().starts_with("TSLA"));
    }
}
