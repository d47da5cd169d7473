//! Property tests for ensemble invariants.
//!
//! 1. Normalized weights sum to one and respect the floor
//! 2. Updates move weights in the direction of the reward
//! 3. Decisions are deterministic and scores stay in [-1, 1]

use proptest::prelude::*;
use std::collections::BTreeMap;
use trading_core::{Signal, StrategyOutput};
use trading_ensemble::{Ensemble, EnsembleConfig};

fn arb_rewards(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..=1.0_f64, n)
}

fn arb_signal() -> impl Strategy<Value = Signal> {
    prop_oneof![Just(Signal::Short), Just(Signal::Flat), Just(Signal::Long)]
}

fn build(n: usize, floor: f64) -> Ensemble {
    let config = EnsembleConfig {
        weight_floor: floor,
        ..Default::default()
    };
    let mut ensemble = Ensemble::new(config).unwrap();
    for i in 0..n {
        ensemble.register(format!("s{i}"));
    }
    ensemble
}

fn reward_map(rewards: &[f64]) -> BTreeMap<String, f64> {
    rewards
        .iter()
        .enumerate()
        .map(|(i, r)| (format!("s{i}"), *r))
        .collect()
}

proptest! {
    /// Normalized weights sum to 1 and none drops below the floor.
    #[test]
    fn normalized_sums_to_one(
        n in 1usize..12,
        floor in 0.001..0.08_f64,
        rounds in prop::collection::vec(arb_rewards(12), 0..60),
    ) {
        let mut ensemble = build(n, floor);
        for round in &rounds {
            ensemble.update(&reward_map(&round[..n]));
        }

        let normalized = ensemble.normalized();
        let sum: f64 = normalized.values().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9, "sum was {}", sum);
        for weight in normalized.values() {
            prop_assert!(*weight >= floor - 1e-12);
        }
        for weight in ensemble.weights().values() {
            prop_assert!(*weight >= floor);
        }
    }

    /// A reward above one half strictly increases a weight, below one half strictly decreases it.
    #[test]
    fn update_is_monotonic(reward in 0.0..=1.0_f64) {
        prop_assume!((reward - 0.5).abs() > 1e-6);
        let mut ensemble = build(1, 0.01);
        let before = ensemble.weight("s0").unwrap();
        ensemble.update(&reward_map(&[reward]));
        let after = ensemble.weight("s0").unwrap();

        if reward > 0.5 {
            prop_assert!(after > before);
        } else {
            prop_assert!(after < before);
        }
    }

    /// Same outputs, same decision; score bounded by one in magnitude.
    #[test]
    fn decide_is_deterministic(
        votes in prop::collection::vec((arb_signal(), 0.0..=1.0_f64), 1..8),
        rounds in prop::collection::vec(arb_rewards(8), 0..10),
    ) {
        let mut ensemble = build(votes.len(), 0.01);
        for round in &rounds {
            ensemble.update(&reward_map(&round[..votes.len()]));
        }

        let outputs: BTreeMap<String, StrategyOutput> = votes
            .iter()
            .enumerate()
            .map(|(i, (signal, conf))| (format!("s{i}"), StrategyOutput::new(*signal, *conf)))
            .collect();

        let first = ensemble.decide(&outputs);
        let second = ensemble.decide(&outputs);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.score.abs() <= 1.0 + 1e-9);
        prop_assert!((0.0..=1.0).contains(&first.confidence));
    }
}

#[test]
fn test_opposing_strategies_never_trade_and_never_vanish() {
    let mut ensemble = build(2, 0.01);
    let outputs: BTreeMap<String, StrategyOutput> = [
        ("s0".to_string(), StrategyOutput::new(Signal::Long, 0.9)),
        ("s1".to_string(), StrategyOutput::new(Signal::Short, 0.9)),
    ]
    .into_iter()
    .collect();

    for i in 0..500 {
        let decision = ensemble.decide(&outputs);
        if i == 0 {
            assert_eq!(decision.signal, Signal::Flat);
        }
        let reward = if i % 2 == 0 { 0.8 } else { 0.2 };
        ensemble.update(&reward_map(&[reward, 1.0 - reward]));
    }

    for weight in ensemble.weights().values() {
        assert!(*weight > 0.0);
    }
    for weight in ensemble.normalized().values() {
        assert!(*weight >= 0.01);
    }
}
