//! Strategy outputs and ensemble decisions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Directional opinion: long (+1), flat (0) or short (-1).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(into = "i8", try_from = "i8")]
pub enum Signal {
    Short,
    #[default]
    Flat,
    Long,
}

impl Signal {
    /// Integer value of the signal.
    pub fn value(self) -> i8 {
        match self {
            Signal::Short => -1,
            Signal::Flat => 0,
            Signal::Long => 1,
        }
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from(self.value())
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal.value()
    }
}

impl TryFrom<i8> for Signal {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Signal::Short),
            0 => Ok(Signal::Flat),
            1 => Ok(Signal::Long),
            other => Err(format!("signal must be -1, 0 or 1, got {other}")),
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Output of one strategy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StrategyOutput {
    /// Direction
    pub signal: Signal,
    /// Self-reported certainty in [0, 1]
    pub confidence: f64,
    /// Free-form indicator values and reasons
    #[serde(default)]
    pub explanation: BTreeMap<String, Value>,
}

impl StrategyOutput {
    /// Create an output, clamping confidence into [0, 1].
    pub fn new(signal: Signal, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            signal,
            confidence,
            explanation: BTreeMap::new(),
        }
    }

    /// Flat signal with zero confidence.
    pub fn neutral() -> Self {
        Self::new(Signal::Flat, 0.0)
    }

    /// Attach an explanation entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.explanation.insert(key.into(), value.into());
        self
    }
}

/// Combined opinion of the ensemble for one symbol and iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Decision {
    /// Final signal after thresholding
    pub signal: Signal,
    /// Weighted average confidence in [0, 1]
    pub confidence: f64,
    /// Raw weighted score, roughly in [-1, 1]
    pub score: f64,
    /// Signal of every participating strategy
    pub votes: BTreeMap<String, i8>,
    /// Normalized weight of every participating strategy
    pub weights: BTreeMap<String, f64>,
    /// Explanation of every participating strategy
    pub explanations: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Decision {
    /// Names of the strategies that voted long.
    pub fn long_voters(&self) -> impl Iterator<Item = &str> {
        self.votes
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|(name, _)| name.as_str())
    }
}
