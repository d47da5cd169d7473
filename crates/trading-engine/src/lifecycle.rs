//! Per-symbol position lifecycle: FLAT → CONFIRMING → LONG → FLAT.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::Signal;

/// Lifecycle state of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolState {
    Flat,
    Confirming,
    Long,
}

impl std::fmt::Display for SymbolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SymbolState::Flat => "flat",
            SymbolState::Confirming => "confirming",
            SymbolState::Long => "long",
        };
        f.write_str(s)
    }
}

/// Engine-side record of an open long position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    /// Fill price of the entry
    pub entry_price: Decimal,
    /// Iteration the entry filled on
    pub entry_iteration: u64,
    /// Bar clock of the entry
    pub entry_time: DateTime<Utc>,
    /// Shares bought at entry
    pub quantity: Decimal,
    /// Protective stop
    pub stop: Decimal,
    /// Profit target
    pub take: Decimal,
    /// Profit levels already filled
    pub levels_taken: Vec<bool>,
    /// Realized P&L so far, commissions included
    pub realized_pnl: Decimal,
    /// Shares sold so far
    pub sold_quantity: Decimal,
    /// Gross proceeds of the shares sold so far
    pub proceeds: Decimal,
}

impl OpenTrade {
    pub fn new(
        entry_price: Decimal,
        quantity: Decimal,
        stop: Decimal,
        take: Decimal,
        entry_iteration: u64,
        entry_time: DateTime<Utc>,
        levels: usize,
    ) -> Self {
        Self {
            entry_price,
            entry_iteration,
            entry_time,
            quantity,
            stop,
            take,
            levels_taken: vec![false; levels],
            realized_pnl: Decimal::ZERO,
            sold_quantity: Decimal::ZERO,
            proceeds: Decimal::ZERO,
        }
    }

    /// Unrealized gain of `price` relative to the entry, as a fraction.
    pub fn gain(&self, price: Decimal) -> Decimal {
        if self.entry_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (price - self.entry_price) / self.entry_price
    }

    /// Bars held as of `iteration`.
    pub fn held_bars(&self, iteration: u64) -> u64 {
        iteration.saturating_sub(self.entry_iteration)
    }

    /// Book a sell fill against the trade.
    pub fn record_sale(&mut self, quantity: Decimal, price: Decimal, commission: Decimal) {
        self.realized_pnl += (price - self.entry_price) * quantity - commission;
        self.sold_quantity += quantity;
        self.proceeds += price * quantity;
    }

    /// Average price of the shares sold so far.
    pub fn average_exit_price(&self) -> Decimal {
        if self.sold_quantity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.proceeds / self.sold_quantity
    }
}

/// Lifecycle of one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolLifecycle {
    confirmations: u32,
    trade: Option<OpenTrade>,
}

impl SymbolLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SymbolState {
        if self.trade.is_some() {
            SymbolState::Long
        } else if self.confirmations > 0 {
            SymbolState::Confirming
        } else {
            SymbolState::Flat
        }
    }

    pub fn is_long(&self) -> bool {
        self.trade.is_some()
    }

    /// Consecutive long decisions seen so far.
    pub fn confirmations(&self) -> u32 {
        self.confirmations
    }

    /// Feed one ensemble decision. Returns whether the long signal is confirmed.
    pub fn observe(&mut self, signal: Signal, confirm_bars: u32) -> bool {
        if signal == Signal::Long {
            self.confirmations = self.confirmations.saturating_add(1);
        } else {
            self.confirmations = 0;
        }
        self.confirmations >= confirm_bars
    }

    pub fn trade(&self) -> Option<&OpenTrade> {
        self.trade.as_ref()
    }

    pub fn trade_mut(&mut self) -> Option<&mut OpenTrade> {
        self.trade.as_mut()
    }

    /// Entry filled: the symbol is LONG.
    pub fn open(&mut self, trade: OpenTrade) {
        self.trade = Some(trade);
    }

    /// Position closed: back to FLAT with a fresh confirmation count.
    pub fn close(&mut self) -> Option<OpenTrade> {
        self.confirmations = 0;
        self.trade.take()
    }
}
