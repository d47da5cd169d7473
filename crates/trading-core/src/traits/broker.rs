//! Broker trait definition.

use crate::types::{Fill, Order, Portfolio, Rejection};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Narrow broker contract used by the execution engine.
///
/// An accepted order fills at the last price set for its symbol adjusted by
/// the broker's slippage and commission. A rejected order leaves the
/// portfolio untouched.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Set the latest mark price for a symbol.
    async fn set_price(&self, symbol: &str, price: Decimal);

    /// Set the marks of one bar together.
    ///
    /// Equity and its peak must only reflect the state after every price is
    /// applied. The default marks one symbol at a time, which is only correct
    /// for brokers that do not track peak equity.
    async fn set_prices(&self, prices: &BTreeMap<String, Decimal>) {
        for (symbol, price) in prices {
            self.set_price(symbol, *price).await;
        }
    }

    /// Submit an order. Orders are never retried by the broker.
    async fn submit_order(&self, order: &Order) -> Result<Fill, Rejection>;

    /// Snapshot of cash and positions.
    async fn portfolio(&self) -> Portfolio;

    /// Get the broker name.
    fn name(&self) -> &str;
}
