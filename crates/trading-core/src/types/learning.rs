//! Persisted learning state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunable parameters of one strategy, by parameter name.
pub type StrategyParams = BTreeMap<String, f64>;

/// Tuned parameters of every strategy, by strategy name.
pub type TunedParams = BTreeMap<String, StrategyParams>;

/// Snapshot of everything the engine needs to resume learning after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    /// When the snapshot was taken (engine clock)
    pub timestamp: DateTime<Utc>,
    /// Raw ensemble weights by strategy
    pub weights: BTreeMap<String, f64>,
    /// Tuned strategy parameters
    #[serde(default)]
    pub params: TunedParams,
    /// Free-form note; carries `tuned_week=<bucket>` once a week has been tuned
    #[serde(default)]
    pub note: String,
    /// Number of ensemble updates applied so far
    #[serde(default)]
    pub update_count: u64,
}

impl LearningState {
    const TUNED_WEEK_PREFIX: &'static str = "tuned_week=";

    /// Encode the last tuned ISO week bucket as a note.
    pub fn tuned_week_note(bucket: &str) -> String {
        format!("{}{}", Self::TUNED_WEEK_PREFIX, bucket)
    }

    /// Last tuned ISO week bucket, if the note carries one.
    pub fn tuned_week(&self) -> Option<&str> {
        self.note
            .split(';')
            .map(str::trim)
            .find_map(|part| part.strip_prefix(Self::TUNED_WEEK_PREFIX))
            .filter(|bucket| !bucket.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(note: &str) -> LearningState {
        LearningState {
            timestamp: Utc::now(),
            weights: BTreeMap::new(),
            params: TunedParams::new(),
            note: note.to_string(),
            update_count: 0,
        }
    }

    #[test]
    fn test_tuned_week_round_trip() {
        let note = LearningState::tuned_week_note("2024-W05");
        assert_eq!(note, "tuned_week=2024-W05");
        assert_eq!(state(&note).tuned_week(), Some("2024-W05"));
    }

    #[test]
    fn test_tuned_week_missing() {
        assert_eq!(state("").tuned_week(), None);
        assert_eq!(state("tuned_week=").tuned_week(), None);
        assert_eq!(state("resumed; tuned_week=2023-W52").tuned_week(), Some("2023-W52"));
    }

    #[test]
    fn test_update_count_defaults_when_absent() {
        let json = r#"{"timestamp":"2024-02-01T00:00:00Z","weights":{"rsi":1.0}}"#;
        let state: LearningState = serde_json::from_str(json).unwrap();
        assert_eq!(state.update_count, 0);
        assert!(state.params.is_empty());
    }
}
