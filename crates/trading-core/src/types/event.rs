//! Event log records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Decision, Fill, Order, Rejection, TunedParams};

/// One append-only event log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Engine clock when the event happened
    pub timestamp: DateTime<Utc>,
    /// Iteration index
    pub iteration: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl EngineEvent {
    pub fn new(timestamp: DateTime<Utc>, iteration: u64, kind: EventKind) -> Self {
        Self {
            timestamp,
            iteration,
            kind,
        }
    }
}

/// Payload of an event log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// Ensemble decision for a symbol
    Decision { symbol: String, decision: Decision },
    /// Order about to be submitted
    Order { order: Order },
    /// Broker fill
    Fill { fill: Fill },
    /// Broker rejection
    Rejection { rejection: Rejection },
    /// Portfolio snapshot at the end of an iteration
    Snapshot {
        cash: Decimal,
        equity: Decimal,
        positions: BTreeMap<String, Decimal>,
    },
    /// Circuit breaker tripped
    CircuitBreaker { reason: String },
    /// A strategy failed, timed out or panicked and was treated as neutral
    StrategyFailure {
        symbol: String,
        strategy: String,
        error: String,
    },
    /// Weekly tuning completed
    Tuned { bucket: String, params: TunedParams },
}

impl EventKind {
    /// Short name of the event, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Decision { .. } => "decision",
            EventKind::Order { .. } => "order",
            EventKind::Fill { .. } => "fill",
            EventKind::Rejection { .. } => "rejection",
            EventKind::Snapshot { .. } => "snapshot",
            EventKind::CircuitBreaker { .. } => "circuit_breaker",
            EventKind::StrategyFailure { .. } => "strategy_failure",
            EventKind::Tuned { .. } => "tuned",
        }
    }
}
