//! Run statistics and report generation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use trading_core::{convert::to_f64, Portfolio};
use trading_risk::{conditional_var, value_at_risk, RiskConfig};

use crate::{EngineConfig, OpenTrade};

/// A round trip from entry fill to the last exit fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    /// Shares bought at entry
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Volume-weighted exit price
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_iteration: u64,
    pub exit_iteration: u64,
    /// Realized P&L, commissions included
    pub pnl: Decimal,
    /// P&L relative to the entry cost
    pub return_pct: f64,
    /// Tag of the order that closed the position
    pub exit_tag: String,
}

impl ClosedTrade {
    pub fn from_trade(
        symbol: &str,
        trade: &OpenTrade,
        exit_time: DateTime<Utc>,
        exit_iteration: u64,
        exit_tag: &str,
    ) -> Self {
        let cost = trade.entry_price * trade.quantity;
        let return_pct = if cost > Decimal::ZERO {
            to_f64(trade.realized_pnl / cost)
        } else {
            0.0
        };
        Self {
            symbol: symbol.to_string(),
            quantity: trade.quantity,
            entry_price: trade.entry_price,
            exit_price: trade.average_exit_price(),
            entry_time: trade.entry_time,
            exit_time,
            entry_iteration: trade.entry_iteration,
            exit_iteration,
            pnl: trade.realized_pnl,
            return_pct,
            exit_tag: exit_tag.to_string(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    FeedExhausted,
    IterationLimit,
    Shutdown,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::FeedExhausted => "feed exhausted",
            StopReason::IterationLimit => "iteration limit",
            StopReason::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Counters and trade statistics collected while the engine runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// Initial capital
    pub initial_capital: Decimal,
    /// Final equity
    pub final_equity: Decimal,
    /// Total return percentage
    pub total_return_pct: Decimal,
    /// Maximum drawdown percentage
    pub max_drawdown_pct: Decimal,
    /// Value at Risk of the per-iteration equity returns, when there is
    /// enough history for the configured method
    pub value_at_risk: Option<f64>,
    /// Expected Shortfall of the per-iteration equity returns
    pub conditional_var: Option<f64>,
    /// Completed iterations
    pub iterations: u64,
    /// Orders submitted
    pub orders: usize,
    /// Orders filled
    pub fills: usize,
    /// Orders rejected
    pub rejections: usize,
    /// Strategy evaluations that failed, timed out or panicked
    pub strategy_failures: usize,
    /// Ensemble weight updates applied
    pub weight_updates: usize,
    /// Closed round trips
    pub total_trades: usize,
    /// Winning round trips
    pub winning_trades: usize,
    /// Losing round trips
    pub losing_trades: usize,
    /// Win rate percentage
    pub win_rate_pct: Decimal,
    /// Realized P&L over all closed trades
    pub realized_pnl: Decimal,
    /// Average winning trade
    pub avg_win: Decimal,
    /// Average losing trade
    pub avg_loss: Decimal,
    /// Equity at the end of every iteration
    pub equity_curve: Vec<(i64, Decimal)>,
    /// Closed round trips
    pub trades: Vec<ClosedTrade>,
    #[serde(skip)]
    peak_equity: Decimal,
}

impl RunStats {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_equity: initial_capital,
            total_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            value_at_risk: None,
            conditional_var: None,
            iterations: 0,
            orders: 0,
            fills: 0,
            rejections: 0,
            strategy_failures: 0,
            weight_updates: 0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            peak_equity: initial_capital,
        }
    }

    /// Record equity at a timestamp.
    pub fn record_equity(&mut self, timestamp: i64, equity: Decimal) {
        self.equity_curve.push((timestamp, equity));

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * dec!(100);
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }
    }

    pub fn add_trade(&mut self, trade: ClosedTrade) {
        self.trades.push(trade);
        self.total_trades += 1;
    }

    /// Returns of closed trades, oldest first.
    pub fn trade_returns(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.return_pct).collect()
    }

    /// Simple returns between consecutive equity points.
    pub fn equity_returns(&self) -> Vec<f64> {
        self.equity_curve
            .windows(2)
            .filter(|w| w[0].1 > Decimal::ZERO)
            .map(|w| to_f64(w[1].1 / w[0].1) - 1.0)
            .collect()
    }

    /// Calculate final statistics.
    pub fn finalize(&mut self, portfolio: &Portfolio, risk: &RiskConfig) {
        self.final_equity = portfolio.equity;

        let returns = self.equity_returns();
        match value_at_risk(&returns, risk.var_confidence, risk.var_method) {
            Ok(var) => {
                self.value_at_risk = Some(var);
                self.conditional_var =
                    conditional_var(&returns, risk.var_confidence, risk.var_method).ok();
            }
            Err(e) => {
                debug!(error = %e, "Value at Risk not reported");
                self.value_at_risk = None;
                self.conditional_var = None;
            }
        }
        if self.initial_capital > Decimal::ZERO {
            self.total_return_pct =
                (self.final_equity - self.initial_capital) / self.initial_capital * dec!(100);
        }

        let mut total_profit = Decimal::ZERO;
        let mut total_loss = Decimal::ZERO;
        self.winning_trades = 0;
        self.losing_trades = 0;
        for trade in &self.trades {
            if trade.pnl > Decimal::ZERO {
                self.winning_trades += 1;
                total_profit += trade.pnl;
            } else if trade.pnl < Decimal::ZERO {
                self.losing_trades += 1;
                total_loss += trade.pnl.abs();
            }
        }
        self.realized_pnl = total_profit - total_loss;

        if self.total_trades > 0 {
            self.win_rate_pct =
                Decimal::from(self.winning_trades * 100) / Decimal::from(self.total_trades);
        }
        if self.winning_trades > 0 {
            self.avg_win = total_profit / Decimal::from(self.winning_trades);
        }
        if self.losing_trades > 0 {
            self.avg_loss = total_loss / Decimal::from(self.losing_trades);
        }
    }
}

/// Complete report of one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Configuration used
    pub config: EngineConfig,
    /// Statistics
    pub stats: RunStats,
    /// Final portfolio state
    pub final_portfolio: Portfolio,
    /// Normalized ensemble weights at the end of the run
    pub final_weights: BTreeMap<String, f64>,
    /// Ensemble updates applied, including resumed ones
    pub update_count: u64,
    pub breaker_triggered: bool,
    pub breaker_reason: Option<String>,
    pub last_tuned_bucket: Option<String>,
    pub stop_reason: StopReason,
}

impl RunReport {
    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                        RUN REPORT                          \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str("PERFORMANCE\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!(
            "  Initial Capital:     ${:.2}\n",
            self.stats.initial_capital
        ));
        s.push_str(&format!(
            "  Final Equity:        ${:.2}\n",
            self.stats.final_equity
        ));
        s.push_str(&format!(
            "  Total Return:        {:.2}%\n",
            self.stats.total_return_pct
        ));
        s.push_str(&format!(
            "  Max Drawdown:        {:.2}%\n",
            self.stats.max_drawdown_pct
        ));
        s.push_str(&format!(
            "  Realized P&L:        ${:.2}\n",
            self.stats.realized_pnl
        ));
        let confidence = self.config.risk.var_confidence * 100.0;
        match (self.stats.value_at_risk, self.stats.conditional_var) {
            (Some(var), Some(cvar)) => {
                s.push_str(&format!(
                    "  VaR ({:.0}%):           {:.2}%\n",
                    confidence,
                    var * 100.0
                ));
                s.push_str(&format!(
                    "  CVaR ({:.0}%):          {:.2}%\n",
                    confidence,
                    cvar * 100.0
                ));
            }
            _ => s.push_str("  VaR:                 n/a (too little history)\n"),
        }
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!(
            "  Total Trades:        {}\n",
            self.stats.total_trades
        ));
        s.push_str(&format!(
            "  Winning Trades:      {}\n",
            self.stats.winning_trades
        ));
        s.push_str(&format!(
            "  Losing Trades:       {}\n",
            self.stats.losing_trades
        ));
        s.push_str(&format!(
            "  Win Rate:            {:.2}%\n",
            self.stats.win_rate_pct
        ));
        s.push_str(&format!("  Avg Win:             ${:.2}\n", self.stats.avg_win));
        s.push_str(&format!("  Avg Loss:            ${:.2}\n", self.stats.avg_loss));
        s.push('\n');

        s.push_str("EXECUTION\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Iterations:          {}\n", self.stats.iterations));
        s.push_str(&format!("  Orders:              {}\n", self.stats.orders));
        s.push_str(&format!("  Fills:               {}\n", self.stats.fills));
        s.push_str(&format!("  Rejections:          {}\n", self.stats.rejections));
        s.push_str(&format!(
            "  Strategy Failures:   {}\n",
            self.stats.strategy_failures
        ));
        s.push_str(&format!("  Stopped By:          {}\n", self.stop_reason));
        match (&self.breaker_triggered, &self.breaker_reason) {
            (true, Some(reason)) => {
                s.push_str(&format!("  Circuit Breaker:     TRIGGERED ({})\n", reason))
            }
            (true, None) => s.push_str("  Circuit Breaker:     TRIGGERED\n"),
            (false, _) => s.push_str("  Circuit Breaker:     armed\n"),
        }
        s.push('\n');

        s.push_str(&format!("ENSEMBLE WEIGHTS ({} updates)\n", self.update_count));
        s.push_str("───────────────────────────────────────────────────────────\n");
        for (name, weight) in &self.final_weights {
            s.push_str(&format!("  {:<20} {:.4}\n", name, weight));
        }
        if let Some(bucket) = &self.last_tuned_bucket {
            s.push_str(&format!("  Last Tuned Week:     {}\n", bucket));
        }
        s.push('\n');

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV (equity curve only).
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("timestamp,equity\n");
        for (ts, equity) in &self.stats.equity_curve {
            csv.push_str(&format!("{},{}\n", ts, equity));
        }
        csv
    }
}
