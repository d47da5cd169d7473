//! Persistence trait.

use crate::error::StoreError;
use crate::types::{EngineEvent, LearningState};

/// Durable store for learning state and the event log.
pub trait LearningStore: Send + Sync {
    /// Most recently logged learning state.
    fn latest_learning_state(&self) -> Result<Option<LearningState>, StoreError>;

    /// Append a learning state snapshot.
    fn log_learning_state(&self, state: &LearningState) -> Result<(), StoreError>;

    /// Append an event to the event log.
    fn append_event(&self, event: &EngineEvent) -> Result<(), StoreError>;
}
