//! Core types and traits for the adaptive ensemble trading engine.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Bar, BarSeries)
//! - Strategy outputs and ensemble decisions
//! - Order, fill, rejection, position and portfolio types
//! - Learning state and event log records used for persistence
//! - Capability traits for strategies, brokers, market feeds and stores

pub mod convert;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{TradingError, TradingResult};
pub use traits::*;
pub use types::*;
