//! Engine status board.
//!
//! The execution loop publishes an [`EngineStatus`] at the end of every
//! iteration; readers on other tasks or threads get a cloned snapshot and
//! never hold the lock across their own work.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// One open position as shown on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStatus {
    /// Shares held
    pub quantity: Decimal,
    /// Average entry price
    pub avg_entry_price: Decimal,
    /// Last marked price
    pub current_price: Decimal,
    /// Unrealized profit/loss
    pub unrealized_pnl: Decimal,
    /// Protective stop attached at entry
    pub stop_loss: Option<Decimal>,
    /// Profit target attached at entry
    pub take_profit: Option<Decimal>,
    /// Lifecycle state of the symbol
    pub state: String,
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Loop is running
    pub running: bool,
    /// Last completed iteration
    pub iteration: u64,
    /// Bar clock of the last iteration
    pub timestamp: Option<DateTime<Utc>>,
    /// Available cash
    pub cash: Decimal,
    /// Cash plus market value
    pub equity: Decimal,
    /// Highest equity seen
    pub peak_equity: Decimal,
    /// Open positions by symbol
    pub positions: BTreeMap<String, PositionStatus>,
    /// Normalized ensemble weights
    pub weights: BTreeMap<String, f64>,
    /// Ensemble updates applied so far
    pub update_count: u64,
    /// Circuit breaker state
    pub breaker_triggered: bool,
    /// Why the breaker tripped
    pub breaker_reason: Option<String>,
    /// Last ISO week the tuner ran for
    pub last_tuned_bucket: Option<String>,
}

impl EngineStatus {
    /// Drawdown from peak in percent.
    pub fn drawdown_pct(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity) / self.peak_equity * Decimal::ONE_HUNDRED
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                      ENGINE STATUS                         \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        let clock = self
            .timestamp
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        s.push_str(&format!(
            "  State:               {}\n",
            if self.running { "running" } else { "stopped" }
        ));
        s.push_str(&format!("  Iteration:           {}\n", self.iteration));
        s.push_str(&format!("  Bar Clock:           {}\n", clock));
        s.push_str(&format!("  Cash:                ${:.2}\n", self.cash));
        s.push_str(&format!("  Equity:              ${:.2}\n", self.equity));
        s.push_str(&format!("  Drawdown:            {:.2}%\n", self.drawdown_pct()));
        match (&self.breaker_triggered, &self.breaker_reason) {
            (true, Some(reason)) => {
                s.push_str(&format!("  Circuit Breaker:     TRIGGERED ({})\n", reason))
            }
            (true, None) => s.push_str("  Circuit Breaker:     TRIGGERED\n"),
            (false, _) => s.push_str("  Circuit Breaker:     armed\n"),
        }
        s.push_str(&format!(
            "  Last Tuned Week:     {}\n",
            self.last_tuned_bucket.as_deref().unwrap_or("-")
        ));
        s.push('\n');

        s.push_str("POSITIONS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        if self.positions.is_empty() {
            s.push_str("  (flat)\n");
        }
        for (symbol, position) in &self.positions {
            s.push_str(&format!(
                "  {:<8} {:>8} @ {:>10.2}  last {:>10.2}  pnl {:>10.2}  {}\n",
                symbol,
                position.quantity,
                position.avg_entry_price,
                position.current_price,
                position.unrealized_pnl,
                position.state
            ));
            if let (Some(stop), Some(take)) = (position.stop_loss, position.take_profit) {
                s.push_str(&format!(
                    "           stop {:>10.2}  take {:>10.2}\n",
                    stop, take
                ));
            }
        }
        s.push('\n');

        s.push_str(&format!("WEIGHTS ({} updates)\n", self.update_count));
        s.push_str("───────────────────────────────────────────────────────────\n");
        for (name, weight) in &self.weights {
            s.push_str(&format!("  {:<20} {:.4}\n", name, weight));
        }
        s.push('\n');

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }
}

/// Shared, copy-on-read holder of the latest [`EngineStatus`].
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<EngineStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published status.
    pub fn publish(&self, status: EngineStatus) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = status;
    }

    /// Modify the published status in place.
    pub fn update(&self, f: impl FnOnce(&mut EngineStatus)) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }

    /// Clone of the latest status.
    pub fn snapshot(&self) -> EngineStatus {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
