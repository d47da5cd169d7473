//! Position and portfolio types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Fill, Side};

/// A long position in a single security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Symbol
    pub symbol: String,
    /// Number of shares held (never negative)
    pub quantity: Decimal,
    /// Average entry price
    pub avg_entry_price: Decimal,
    /// Current market price
    pub current_price: Decimal,
    /// Market value (quantity * current_price)
    pub market_value: Decimal,
    /// Cost basis (quantity * avg_entry_price)
    pub cost_basis: Decimal,
    /// Unrealized profit/loss
    pub unrealized_pnl: Decimal,
    /// Realized profit/loss from closed portions
    pub realized_pnl: Decimal,
    /// Protective stop attached at entry
    pub stop_loss: Option<Decimal>,
    /// Profit target attached at entry
    pub take_profit: Option<Decimal>,
}

impl Position {
    /// Create a new position.
    pub fn new(symbol: impl Into<String>, quantity: Decimal, avg_entry_price: Decimal) -> Self {
        let cost_basis = quantity * avg_entry_price;
        Self {
            symbol: symbol.into(),
            quantity,
            avg_entry_price,
            current_price: avg_entry_price,
            market_value: cost_basis,
            cost_basis,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            stop_loss: None,
            take_profit: None,
        }
    }

    /// Attach stop and target levels. `None` keeps the current level.
    pub fn attach_levels(&mut self, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) {
        if stop_loss.is_some() {
            self.stop_loss = stop_loss;
        }
        if take_profit.is_some() {
            self.take_profit = take_profit;
        }
    }

    /// Check if the position is flat (no shares).
    pub fn is_flat(&self) -> bool {
        self.quantity <= Decimal::ZERO
    }

    /// Update the current market price and recalculate values.
    pub fn update_price(&mut self, price: Decimal) {
        self.current_price = price;
        self.market_value = self.quantity * price;
        self.unrealized_pnl = self.market_value - self.cost_basis;
    }

    /// Unrealized return relative to the average entry price.
    pub fn unrealized_return(&self) -> Decimal {
        if self.avg_entry_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.current_price - self.avg_entry_price) / self.avg_entry_price
    }

    /// Loss as a positive fraction of entry price (zero when in profit).
    pub fn loss_fraction(&self) -> Decimal {
        (-self.unrealized_return()).max(Decimal::ZERO)
    }

    /// Apply a fill to the position.
    /// Returns the realized P&L when shares are sold.
    pub fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        let realized = match side {
            Side::Buy => {
                let total_cost = self.quantity * self.avg_entry_price + quantity * price;
                self.quantity += quantity;
                if self.quantity > Decimal::ZERO {
                    self.avg_entry_price = total_cost / self.quantity;
                }
                Decimal::ZERO
            }
            Side::Sell => {
                let close_qty = quantity.min(self.quantity);
                let realized = close_qty * (price - self.avg_entry_price);
                self.quantity -= close_qty;
                self.realized_pnl += realized;
                realized
            }
        };

        self.cost_basis = self.quantity * self.avg_entry_price;
        self.update_price(price);

        realized
    }
}

/// Portfolio containing cash and positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Available cash
    pub cash: Decimal,
    /// Total equity (cash + market value of positions)
    pub equity: Decimal,
    /// Map of symbol to position
    pub positions: BTreeMap<String, Position>,
    /// Total realized P&L across all positions
    pub total_realized_pnl: Decimal,
    /// Total commissions paid
    pub total_commission: Decimal,
    /// Initial capital (for calculating returns)
    pub initial_capital: Decimal,
    /// Highest equity reached (for drawdown calculation)
    pub peak_equity: Decimal,
}

impl Portfolio {
    /// Create a new portfolio with initial cash.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            equity: initial_capital,
            positions: BTreeMap::new(),
            total_realized_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            initial_capital,
            peak_equity: initial_capital,
        }
    }

    /// Get a position by symbol.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Shares held in `symbol` (zero when flat).
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Check if we have a position in a symbol.
    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions
            .get(symbol)
            .map(|p| !p.is_flat())
            .unwrap_or(false)
    }

    /// Get the total market value of all positions.
    pub fn total_market_value(&self) -> Decimal {
        self.positions.values().map(|p| p.market_value).sum()
    }

    /// Market value per symbol.
    pub fn position_values(&self) -> BTreeMap<String, Decimal> {
        self.positions
            .iter()
            .map(|(s, p)| (s.clone(), p.market_value))
            .collect()
    }

    /// Loss fraction per symbol, used by the circuit breaker.
    pub fn position_losses(&self) -> BTreeMap<String, Decimal> {
        self.positions
            .iter()
            .map(|(s, p)| (s.clone(), p.loss_fraction()))
            .collect()
    }

    /// Update the equity and the running peak.
    pub fn update_equity(&mut self) {
        self.equity = self.cash + self.total_market_value();
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }
    }

    /// Mark one symbol to a new price.
    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.update_price(price);
        }
        self.update_equity();
    }

    /// Mark several symbols, then update equity and the peak once.
    pub fn mark_all(&mut self, prices: &BTreeMap<String, Decimal>) {
        for (symbol, price) in prices {
            if let Some(position) = self.positions.get_mut(symbol) {
                position.update_price(*price);
            }
        }
        self.update_equity();
    }

    /// Apply an executed fill to cash and positions.
    pub fn apply_fill(&mut self, fill: &Fill) {
        let value = fill.value();
        match fill.side {
            Side::Buy => self.cash -= value + fill.commission,
            Side::Sell => self.cash += value - fill.commission,
        }
        self.total_commission += fill.commission;

        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(&fill.symbol, Decimal::ZERO, Decimal::ZERO));
        let realized = position.apply_fill(fill.side, fill.quantity, fill.price);
        self.total_realized_pnl += realized;

        if position.is_flat() {
            self.positions.remove(&fill.symbol);
        }

        self.update_equity();
    }

    /// Drawdown from peak as a fraction.
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity) / self.peak_equity
    }

    /// Total return as a fraction of initial capital.
    pub fn total_return(&self) -> Decimal {
        if self.initial_capital == Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.equity - self.initial_capital) / self.initial_capital
    }
}
