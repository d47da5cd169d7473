//! Core data types for the trading system.

mod event;
mod learning;
mod ohlcv;
mod order;
mod position;
mod signal;

pub use event::{EngineEvent, EventKind};
pub use learning::{LearningState, StrategyParams, TunedParams};
pub use ohlcv::{Bar, BarSeries};
pub use order::{Fill, Order, OrderType, RejectReason, Rejection, Side};
pub use position::{Portfolio, Position};
pub use signal::{Decision, Signal, StrategyOutput};
