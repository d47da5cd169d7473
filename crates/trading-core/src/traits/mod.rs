//! Capability traits for the trading system.

mod broker;
mod feed;
mod store;
mod strategy;

pub use broker::Broker;
pub use feed::MarketFeed;
pub use store::LearningStore;
pub use strategy::SignalStrategy;
