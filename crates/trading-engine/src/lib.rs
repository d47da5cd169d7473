//! Execution engine for the adaptive ensemble trader.
//!
//! This crate provides:
//! - The iteration loop (`ExecutionEngine`) tying feed, strategies, ensemble,
//!   risk, broker and store together
//! - The per-symbol position lifecycle with entry confirmation
//! - Exit planning (stop/target, profit tranches, time exits)
//! - A bounded worker pool for strategy evaluation
//! - Reward construction for ensemble learning and the run report

mod config;
mod engine;
mod exits;
mod lifecycle;
mod pool;
mod report;
mod rewards;

pub use config::{EngineConfig, ExecutionConfig, ProfitLevel};
pub use engine::{ExecutionEngine, StepOutcome};
pub use exits::{plan_exits, ExitPlan, ExitReason, Tranche};
pub use lifecycle::{OpenTrade, SymbolLifecycle, SymbolState};
pub use pool::{Evaluation, EvaluationFailure, EvaluationPool};
pub use report::{ClosedTrade, RunReport, RunStats, StopReason};
pub use rewards::RewardTracker;
