//! Exit planning for an open long position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::convert::{to_decimal, to_f64};

use crate::{ExecutionConfig, OpenTrade};

/// Why a position (or part of it) is sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Zero-based index into the configured profit levels
    ProfitLevel(usize),
    TimeExit,
    SignalFlat,
    SignalReverse,
}

impl ExitReason {
    /// Order tag for this exit.
    pub fn tag(&self) -> String {
        match self {
            ExitReason::StopLoss => "stop_loss".to_string(),
            ExitReason::TakeProfit => "take_profit".to_string(),
            ExitReason::ProfitLevel(index) => format!("profit_level_{}", index + 1),
            ExitReason::TimeExit => "time_exit".to_string(),
            ExitReason::SignalFlat => "signal_flat".to_string(),
            ExitReason::SignalReverse => "signal_reverse".to_string(),
        }
    }
}

/// Partial sale at one profit level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tranche {
    /// Zero-based profit level index
    pub level: usize,
    /// Whole shares to sell
    pub quantity: Decimal,
}

/// Exits due for one position on one bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExitPlan {
    /// Stop or target hit: sell everything and skip the rest
    pub protective: Option<ExitReason>,
    /// Profit-level tranches, in level order
    pub tranches: Vec<Tranche>,
    /// Sell whatever is left after the tranches
    pub time_exit: bool,
}

impl ExitPlan {
    pub fn is_empty(&self) -> bool {
        self.protective.is_none() && self.tranches.is_empty() && !self.time_exit
    }
}

/// Plan the exits for `trade` given the latest close and the shares still held.
///
/// Stop and target take priority over everything else. Profit levels are
/// checked in order and may all fire on the same bar; each tranche is sized
/// against the shares remaining so that the configured fractions refer to the
/// original allocation, and the last level sells everything left.
pub fn plan_exits(
    trade: &OpenTrade,
    close: Decimal,
    remaining: Decimal,
    iteration: u64,
    config: &ExecutionConfig,
) -> ExitPlan {
    let mut plan = ExitPlan::default();
    if remaining <= Decimal::ZERO {
        return plan;
    }
    if close <= trade.stop {
        plan.protective = Some(ExitReason::StopLoss);
        return plan;
    }
    if close >= trade.take {
        plan.protective = Some(ExitReason::TakeProfit);
        return plan;
    }

    let gain = to_f64(trade.gain(close));
    let mut left = remaining;
    let mut sold_fraction: Decimal = config
        .profit_levels
        .iter()
        .zip(&trade.levels_taken)
        .filter(|(_, taken)| **taken)
        .map(|(level, _)| to_decimal(level.fraction))
        .sum();

    let last = config.profit_levels.len().saturating_sub(1);
    for (index, level) in config.profit_levels.iter().enumerate() {
        if trade.levels_taken.get(index).copied().unwrap_or(false) {
            continue;
        }
        if gain < level.gain || left <= Decimal::ZERO {
            break;
        }

        let fraction = to_decimal(level.fraction);
        let unsold = Decimal::ONE - sold_fraction;
        let quantity = if index == last || fraction >= unsold {
            left
        } else {
            (left * fraction / unsold).floor().min(left)
        };
        sold_fraction += fraction;

        if quantity > Decimal::ZERO {
            plan.tranches.push(Tranche {
                level: index,
                quantity,
            });
            left -= quantity;
        }
    }

    if left > Decimal::ZERO
        && trade.held_bars(iteration) > config.max_hold_bars
        && gain < config.time_exit_min_gain
    {
        plan.time_exit = true;
    }

    plan
}
