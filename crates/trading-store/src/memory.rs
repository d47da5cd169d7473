//! In-memory store.

use std::collections::VecDeque;
use std::sync::RwLock;
use trading_core::error::StoreError;
use trading_core::traits::LearningStore;
use trading_core::types::{EngineEvent, LearningState};

/// Learning states kept by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Store that keeps everything in memory.
///
/// Only the most recent learning states are kept; older ones are dropped once
/// the history limit is reached.
#[derive(Debug)]
pub struct MemoryStore {
    states: RwLock<VecDeque<LearningState>>,
    history_limit: usize,
    events: RwLock<Vec<EngineEvent>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            states: RwLock::new(VecDeque::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
            events: RwLock::new(Vec::new()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously saved learning state.
    pub fn with_state(state: LearningState) -> Self {
        Self {
            states: RwLock::new(VecDeque::from([state])),
            ..Self::default()
        }
    }

    /// Keep at most `limit` learning states (at least one).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Copy of the retained learning states, oldest first.
    pub fn learning_history(&self) -> Result<Vec<LearningState>, StoreError> {
        let states = self.states.read().map_err(|_| StoreError::Poisoned)?;
        Ok(states.iter().cloned().collect())
    }

    /// Copy of all logged events.
    pub fn events(&self) -> Result<Vec<EngineEvent>, StoreError> {
        Ok(self.events.read().map_err(|_| StoreError::Poisoned)?.clone())
    }
}

impl LearningStore for MemoryStore {
    fn latest_learning_state(&self) -> Result<Option<LearningState>, StoreError> {
        Ok(self
            .states
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .back()
            .cloned())
    }

    fn log_learning_state(&self, state: &LearningState) -> Result<(), StoreError> {
        let mut states = self.states.write().map_err(|_| StoreError::Poisoned)?;
        while states.len() >= self.history_limit {
            states.pop_front();
        }
        states.push_back(state.clone());
        Ok(())
    }

    fn append_event(&self, event: &EngineEvent) -> Result<(), StoreError> {
        self.events
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(event.clone());
        Ok(())
    }
}
