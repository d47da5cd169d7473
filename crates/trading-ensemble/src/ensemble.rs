//! Multiplicative-weights ensemble.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;
use trading_core::{Decision, Signal, StrategyOutput, TradingError};

use crate::EnsembleConfig;

/// Learnable state of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleState {
    /// Raw weight per strategy, each at least the floor
    pub weights: BTreeMap<String, f64>,
    /// Base learning rate
    pub eta_base: f64,
    /// Number of updates applied
    pub update_count: u64,
}

/// Online ensemble over named strategies.
///
/// Weights are only created by [`register`](Self::register) and only changed
/// by [`update`](Self::update) and [`restore`](Self::restore). The normalized
/// weights are cached and recomputed lazily after every mutation.
#[derive(Debug)]
pub struct Ensemble {
    config: EnsembleConfig,
    state: EnsembleState,
    normalized: OnceLock<BTreeMap<String, f64>>,
}

impl Ensemble {
    /// Create an empty ensemble.
    pub fn new(config: EnsembleConfig) -> Result<Self, TradingError> {
        config.validate()?;
        let state = EnsembleState {
            weights: BTreeMap::new(),
            eta_base: config.eta,
            update_count: 0,
        };
        Ok(Self {
            config,
            state,
            normalized: OnceLock::new(),
        })
    }

    /// Rebuild an ensemble from a saved state. Weights are clamped to the floor.
    pub fn from_state(config: EnsembleConfig, state: EnsembleState) -> Result<Self, TradingError> {
        let mut ensemble = Self::new(config)?;
        let floor = ensemble.config.weight_floor;
        ensemble.state.weights = state
            .weights
            .into_iter()
            .map(|(name, w)| (name, sanitize(w, floor)))
            .collect();
        ensemble.state.eta_base = state.eta_base;
        ensemble.state.update_count = state.update_count;
        Ok(ensemble)
    }

    /// Register a strategy with the initial weight. Re-registering keeps the
    /// current weight.
    pub fn register(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.state.weights.contains_key(&name) {
            return;
        }
        self.state.weights.insert(name, self.config.initial_weight);
        self.invalidate();
    }

    /// Overwrite weights of registered strategies from persisted values.
    /// Unknown names are ignored. Returns how many weights were restored.
    pub fn restore(&mut self, weights: &BTreeMap<String, f64>, update_count: u64) -> usize {
        let floor = self.config.weight_floor;
        let mut restored = 0;
        for (name, weight) in weights {
            if let Some(current) = self.state.weights.get_mut(name) {
                *current = sanitize(*weight, floor);
                restored += 1;
            } else {
                debug!(strategy = %name, "Ignoring persisted weight for unregistered strategy");
            }
        }
        self.state.update_count = update_count;
        self.invalidate();
        restored
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.weights.contains_key(name)
    }

    /// Raw weight of a strategy.
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.state.weights.get(name).copied()
    }

    /// Raw weights of all strategies.
    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.state.weights
    }

    pub fn update_count(&self) -> u64 {
        self.state.update_count
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Copy of the learnable state for persistence and concurrent readers.
    pub fn state(&self) -> EnsembleState {
        self.state.clone()
    }

    /// Learning rate for the next update.
    pub fn current_eta(&self) -> f64 {
        self.state.eta_base
            / (1.0 + self.state.update_count as f64 / self.config.eta_decay_updates)
    }

    /// Normalized weights: sum to one and none below the floor.
    pub fn normalized(&self) -> &BTreeMap<String, f64> {
        self.normalized
            .get_or_init(|| normalize(&self.state.weights, self.config.weight_floor))
    }

    /// Combine strategy outputs into a decision.
    ///
    /// Outputs from unregistered strategies are ignored. The score uses the
    /// normalized weights of all registered strategies, so a missing strategy
    /// pulls the score towards zero.
    pub fn decide(&self, outputs: &BTreeMap<String, StrategyOutput>) -> Decision {
        let normalized = self.normalized();
        let mut decision = Decision::default();
        let mut confidence_sum = 0.0;
        let mut weight_sum = 0.0;

        for (name, output) in outputs {
            let Some(&weight) = normalized.get(name) else {
                continue;
            };
            decision.score += output.signal.as_f64() * weight * output.confidence;
            confidence_sum += weight * output.confidence;
            weight_sum += weight;

            decision.votes.insert(name.clone(), output.signal.value());
            decision.weights.insert(name.clone(), weight);
            decision
                .explanations
                .insert(name.clone(), output.explanation.clone());
        }

        decision.signal = if decision.score >= self.config.buy_threshold {
            Signal::Long
        } else if decision.score <= -self.config.sell_threshold {
            Signal::Short
        } else {
            Signal::Flat
        };
        decision.confidence = if weight_sum > 0.0 {
            (confidence_sum / weight_sum).clamp(0.0, 1.0)
        } else {
            0.0
        };
        decision
    }

    /// Multiplicative-weights update from rewards in [0, 1].
    ///
    /// A reward above 0.5 grows the weight, below 0.5 shrinks it. Unknown
    /// names are ignored and the update counter advances once per call.
    pub fn update(&mut self, rewards: &BTreeMap<String, f64>) {
        let eta = self.current_eta();
        let floor = self.config.weight_floor;

        for (name, reward) in rewards {
            let Some(weight) = self.state.weights.get_mut(name) else {
                continue;
            };
            let reward = if reward.is_finite() {
                reward.clamp(0.0, 1.0)
            } else {
                0.5
            };
            *weight = sanitize(*weight * (eta * (reward - 0.5)).exp(), floor);
        }

        self.state.update_count += 1;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.normalized.take();
    }
}

fn sanitize(weight: f64, floor: f64) -> f64 {
    if weight.is_finite() {
        weight.max(floor)
    } else {
        floor
    }
}

/// Scale weights to sum to one while keeping each share at least `floor`.
///
/// Shares that would fall below the floor are pinned to it and the remaining
/// mass is redistributed proportionally over the others.
fn normalize(weights: &BTreeMap<String, f64>, floor: f64) -> BTreeMap<String, f64> {
    let n = weights.len();
    if n == 0 {
        return BTreeMap::new();
    }
    if n as f64 * floor >= 1.0 {
        let uniform = 1.0 / n as f64;
        return weights.keys().map(|k| (k.clone(), uniform)).collect();
    }

    let mut pinned: BTreeMap<&str, bool> = weights.keys().map(|k| (k.as_str(), false)).collect();
    loop {
        let pinned_count = pinned.values().filter(|p| **p).count();
        let free_mass = 1.0 - pinned_count as f64 * floor;
        let free_sum: f64 = weights
            .iter()
            .filter(|(k, _)| !pinned[k.as_str()])
            .map(|(_, w)| *w)
            .sum();

        let mut newly_pinned = false;
        for (name, weight) in weights {
            if !pinned[name.as_str()] && free_mass * weight / free_sum < floor {
                pinned.insert(name.as_str(), true);
                newly_pinned = true;
            }
        }

        if !newly_pinned {
            return weights
                .iter()
                .map(|(name, weight)| {
                    let share = if pinned[name.as_str()] {
                        floor
                    } else {
                        free_mass * weight / free_sum
                    };
                    (name.clone(), share)
                })
                .collect();
        }
    }
}
