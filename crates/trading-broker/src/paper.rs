//! Paper trading broker for simulation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;
use trading_core::traits::Broker;
use trading_core::types::{Fill, Order, Portfolio, RejectReason, Rejection, Side};
use uuid::Uuid;

/// Fee and slippage model of the paper broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperBrokerConfig {
    /// Slippage in percent of the last price (0.05 = 0.05%)
    pub slippage_pct: Decimal,
    /// Commission charged per share
    pub commission_per_share: Decimal,
}

impl Default for PaperBrokerConfig {
    fn default() -> Self {
        Self {
            slippage_pct: dec!(0.05),
            commission_per_share: Decimal::ZERO,
        }
    }
}

#[derive(Debug)]
struct BrokerState {
    portfolio: Portfolio,
    prices: BTreeMap<String, Decimal>,
}

/// Paper trading broker for simulation.
///
/// Market orders fill immediately at the last price set for the symbol,
/// moved against the trader by the slippage.
#[derive(Debug)]
pub struct PaperBroker {
    state: Mutex<BrokerState>,
    config: PaperBrokerConfig,
}

impl PaperBroker {
    /// Create a new paper broker with initial capital.
    pub fn new(initial_capital: Decimal) -> Self {
        Self::with_config(initial_capital, PaperBrokerConfig::default())
    }

    pub fn with_config(initial_capital: Decimal, config: PaperBrokerConfig) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                portfolio: Portfolio::new(initial_capital),
                prices: BTreeMap::new(),
            }),
            config,
        }
    }

    /// Set slippage percentage.
    pub fn with_slippage(mut self, slippage_pct: Decimal) -> Self {
        self.config.slippage_pct = slippage_pct;
        self
    }

    /// Set commission per share.
    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.config.commission_per_share = commission;
        self
    }

    /// Last price set for a symbol.
    pub async fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.state.lock().await.prices.get(symbol).copied()
    }

    fn fill_price(&self, side: Side, last: Decimal) -> Decimal {
        let slip = self.config.slippage_pct / dec!(100);
        match side {
            Side::Buy => last * (Decimal::ONE + slip),
            Side::Sell => last * (Decimal::ONE - slip),
        }
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn set_price(&self, symbol: &str, price: Decimal) {
        let mut state = self.state.lock().await;
        state.prices.insert(symbol.to_string(), price);
        state.portfolio.mark(symbol, price);
    }

    async fn set_prices(&self, prices: &BTreeMap<String, Decimal>) {
        let mut state = self.state.lock().await;
        for (symbol, price) in prices {
            state.prices.insert(symbol.clone(), *price);
        }
        state.portfolio.mark_all(prices);
    }

    async fn submit_order(&self, order: &Order) -> Result<Fill, Rejection> {
        let mut state = self.state.lock().await;

        if order.quantity <= Decimal::ZERO {
            return Err(Rejection::of(
                order,
                RejectReason::InvalidQuantity,
                format!("quantity must be positive, got {}", order.quantity),
            ));
        }

        let Some(last) = state.prices.get(&order.symbol).copied() else {
            return Err(Rejection::of(
                order,
                RejectReason::NoPrice,
                format!("no price for {}", order.symbol),
            ));
        };

        let price = self.fill_price(order.side, last);
        let commission = self.config.commission_per_share * order.quantity;

        match order.side {
            Side::Buy => {
                let required = price * order.quantity + commission;
                if required > state.portfolio.cash {
                    return Err(Rejection::of(
                        order,
                        RejectReason::InsufficientFunds,
                        format!(
                            "requires {} but only {} available",
                            required.round_dp(2),
                            state.portfolio.cash.round_dp(2)
                        ),
                    ));
                }
            }
            Side::Sell => {
                let held = state.portfolio.quantity(&order.symbol);
                if order.quantity > held {
                    return Err(Rejection::of(
                        order,
                        RejectReason::InsufficientPosition,
                        format!("selling {} but holding {}", order.quantity, held),
                    ));
                }
            }
        }

        let fill = Fill {
            id: Uuid::new_v4(),
            order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
            commission,
            tag: order.tag.clone(),
            timestamp: order.created_at,
        };
        state.portfolio.apply_fill(&fill);
        if order.side == Side::Buy {
            if let Some(position) = state.portfolio.positions.get_mut(&order.symbol) {
                position.attach_levels(order.stop_loss, order.take_profit);
            }
        }
        // Keep the position marked at the last price rather than the slipped fill
        state.portfolio.mark(&order.symbol, last);

        debug!(
            symbol = %fill.symbol,
            side = %fill.side,
            quantity = %fill.quantity,
            price = %fill.price,
            "Paper fill"
        );
        Ok(fill)
    }

    async fn portfolio(&self) -> Portfolio {
        self.state.lock().await.portfolio.clone()
    }

    fn name(&self) -> &str {
        "Paper Broker"
    }
}
