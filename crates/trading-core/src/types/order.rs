//! Order, fill and rejection types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type. Only market orders are produced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Execute immediately at the last known price plus slippage
    #[default]
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
        }
    }
}

/// An order created by the execution engine.
///
/// Orders are submitted exactly once and become terminal as soon as the broker
/// answers with a [`Fill`] or a [`Rejection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID
    pub id: Uuid,
    /// Symbol traded
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Quantity in whole shares
    pub quantity: Decimal,
    /// Why the order was created (`entry`, `stop_loss`, `time_exit`, ...)
    pub tag: String,
    /// When the order was created (engine clock)
    pub created_at: DateTime<Utc>,
    /// Stop to attach to the position when a buy fills
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// Target to attach to the position when a buy fills
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
}

impl Order {
    /// Create a market order.
    pub fn market(
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        tag: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            tag: tag.into(),
            created_at,
            stop_loss: None,
            take_profit: None,
        }
    }

    /// Attach protective levels carried to the position on fill.
    pub fn with_levels(mut self, stop_loss: Decimal, take_profit: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self.take_profit = Some(take_profit);
        self
    }
}

/// Execution of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Fill ID
    pub id: Uuid,
    /// Order ID this fill belongs to
    pub order_id: Uuid,
    /// Symbol traded
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Quantity filled
    pub quantity: Decimal,
    /// Price at which the fill occurred, slippage included
    pub price: Decimal,
    /// Commission charged
    pub commission: Decimal,
    /// Tag copied from the order
    pub tag: String,
    /// Timestamp of the fill
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// Gross traded value (price * quantity).
    pub fn value(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Why the broker refused an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No price has been set for the symbol
    NoPrice,
    /// Quantity was zero or negative
    InvalidQuantity,
    /// Cash does not cover cost plus commission
    InsufficientFunds,
    /// Sell quantity exceeds the open position
    InsufficientPosition,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::NoPrice => "no_price",
            RejectReason::InvalidQuantity => "invalid_quantity",
            RejectReason::InsufficientFunds => "insufficient_funds",
            RejectReason::InsufficientPosition => "insufficient_position",
        };
        f.write_str(s)
    }
}

/// Broker refusal of an order. The portfolio is unchanged.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("order {order_id} for {symbol} rejected ({reason}): {message}")]
pub struct Rejection {
    /// Order ID that was rejected
    pub order_id: Uuid,
    /// Symbol of the order
    pub symbol: String,
    /// Side of the order
    pub side: Side,
    /// Requested quantity
    pub quantity: Decimal,
    /// Tag copied from the order
    pub tag: String,
    /// Rejection category
    pub reason: RejectReason,
    /// Human-readable detail
    pub message: String,
}

impl Rejection {
    /// Build a rejection for `order`.
    pub fn of(order: &Order, reason: RejectReason, message: impl Into<String>) -> Self {
        Self {
            order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            tag: order.tag.clone(),
            reason,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_order() {
        let order = Order::market("AAPL", Side::Buy, dec!(100), "entry", Utc::now());
        assert_eq!(order.symbol, "AAPL");
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.quantity, dec!(100));
        assert_eq!(order.tag, "entry");
    }

    #[test]
    fn test_rejection_keeps_order_identity() {
        let order = Order::market("AAPL", Side::Sell, dec!(5), "signal_flat", Utc::now());
        let rejection = Rejection::of(&order, RejectReason::InsufficientPosition, "holding 0");

        assert_eq!(rejection.order_id, order.id);
        assert_eq!(rejection.tag, "signal_flat");
        assert!(rejection.to_string().contains("insufficient_position"));
    }

    #[test]
    fn test_side_serializes_uppercase() {
        let json = serde_json::to_string(&Side::Sell).unwrap();
        assert_eq!(json, "\"SELL\"");
    }
}
