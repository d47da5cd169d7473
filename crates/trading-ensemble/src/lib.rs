//! Ensemble weighting engine.
//!
//! Keeps one weight per registered strategy, combines strategy outputs into a
//! [`Decision`](trading_core::Decision) and learns from realized rewards with a
//! multiplicative-weights update.

mod config;
mod ensemble;
mod reward;

pub use config::EnsembleConfig;
pub use ensemble::{Ensemble, EnsembleState};
pub use reward::squash_reward;
