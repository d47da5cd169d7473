//! End-to-end tests of the execution loop against the paper broker.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use trading_broker::PaperBroker;
use trading_core::error::StrategyError;
use trading_core::{
    Bar, Broker, EngineEvent, EventKind, LearningState, LearningStore, Signal, SignalStrategy,
    StrategyOutput, StrategyParams, TunedParams,
};
use trading_data::ReplayFeed;
use trading_engine::{EngineConfig, ExecutionEngine, StepOutcome, StopReason, SymbolState};
use trading_store::{JsonlStore, MemoryStore};

const DAY_MS: i64 = 86_400_000;
const START_MS: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

struct Constant {
    name: &'static str,
    signal: Signal,
    confidence: f64,
}

impl SignalStrategy for Constant {
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(&self, _history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
        Ok(StrategyOutput::new(self.signal, self.confidence))
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
    }

    fn lookback(&self) -> usize {
        1
    }
}

/// Emits `signals[n - 1]` for a history of `n` bars, flat afterwards.
struct Script {
    signals: Vec<Signal>,
}

impl SignalStrategy for Script {
    fn name(&self) -> &str {
        "script"
    }

    fn evaluate(&self, history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
        let signal = history
            .len()
            .checked_sub(1)
            .and_then(|i| self.signals.get(i))
            .copied()
            .unwrap_or(Signal::Flat);
        Ok(StrategyOutput::new(signal, 1.0))
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
    }

    fn lookback(&self) -> usize {
        1
    }
}

struct Failing;

impl SignalStrategy for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn evaluate(&self, _history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
        Err(StrategyError::EvaluationFailed("feed of the strategy is down".to_string()))
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
    }

    fn lookback(&self) -> usize {
        1
    }
}

fn long(name: &'static str) -> Arc<dyn SignalStrategy> {
    Arc::new(Constant {
        name,
        signal: Signal::Long,
        confidence: 0.9,
    })
}

fn bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Bar::flat(START_MS + i as i64 * DAY_MS, *close))
        .collect()
}

fn feed(closes: &[f64]) -> Box<ReplayFeed> {
    let mut series = BTreeMap::new();
    series.insert("AAPL".to_string(), bars(closes));
    Box::new(ReplayFeed::new(series))
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.tuner.enabled = false;
    config.execution.worker_threads = 2;
    config
}

fn engine(
    config: EngineConfig,
    strategies: Vec<Arc<dyn SignalStrategy>>,
    closes: &[f64],
    broker: &Arc<PaperBroker>,
    store: &Arc<MemoryStore>,
) -> ExecutionEngine {
    ExecutionEngine::with_strategies(
        config,
        strategies,
        broker.clone(),
        feed(closes),
        store.clone(),
    )
    .unwrap()
}

fn zero_slippage() -> Arc<PaperBroker> {
    Arc::new(PaperBroker::new(dec!(100000)).with_slippage(Decimal::ZERO))
}

fn events(store: &MemoryStore) -> Vec<EngineEvent> {
    store.events().unwrap()
}

fn order_tags(store: &MemoryStore) -> Vec<String> {
    events(store)
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::Order { order } => Some(order.tag),
            _ => None,
        })
        .collect()
}

fn sold_quantities(store: &MemoryStore) -> Vec<(String, Decimal)> {
    events(store)
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::Fill { fill } if fill.tag != "entry" => Some((fill.tag, fill.quantity)),
            _ => None,
        })
        .collect()
}

fn count(store: &MemoryStore, name: &str) -> usize {
    events(store)
        .iter()
        .filter(|e| e.kind.name() == name)
        .count()
}

#[tokio::test]
async fn test_opposing_strategies_never_trade() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let strategies: Vec<Arc<dyn SignalStrategy>> = vec![
        long("bull"),
        Arc::new(Constant {
            name: "bear",
            signal: Signal::Short,
            confidence: 0.9,
        }),
    ];
    let closes: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
    let mut engine = engine(config(), strategies, &closes, &broker, &store);

    let report = engine.run().await;

    assert_eq!(report.stop_reason, StopReason::FeedExhausted);
    assert_eq!(report.stats.iterations, 40);
    assert_eq!(report.stats.orders, 0);
    for event in events(&store) {
        if let EventKind::Decision { decision, .. } = event.kind {
            assert_eq!(decision.signal, Signal::Flat);
        }
    }
    for weight in report.final_weights.values() {
        assert!(*weight > 0.0);
    }
    assert!(engine.ensemble().weight("bull").unwrap() >= 0.01);
    assert!(engine.ensemble().weight("bear").unwrap() >= 0.01);
}

#[tokio::test]
async fn test_entry_after_confirmation_then_signal_flat_exit() {
    let broker = Arc::new(PaperBroker::new(dec!(100000)));
    let store = Arc::new(MemoryStore::new());
    let signals = vec![Signal::Long; 5];
    let strategies: Vec<Arc<dyn SignalStrategy>> = vec![Arc::new(Script { signals })];
    let mut engine = engine(config(), strategies, &[100.0; 7], &broker, &store);

    assert_eq!(engine.step().await, StepOutcome::Completed);
    assert_eq!(
        engine.lifecycle("AAPL").unwrap().state(),
        SymbolState::Confirming
    );
    assert_eq!(engine.step().await, StepOutcome::Completed);
    assert_eq!(engine.lifecycle("AAPL").unwrap().state(), SymbolState::Long);
    let portfolio = broker.portfolio().await;
    assert_eq!(portfolio.quantity("AAPL"), dec!(200));
    let trade = engine.lifecycle("AAPL").unwrap().trade().unwrap();
    let position = &portfolio.positions["AAPL"];
    assert_eq!(position.stop_loss, Some(trade.stop));
    assert_eq!(position.take_profit, Some(trade.take));

    let report = engine.run().await;

    assert_eq!(order_tags(&store), vec!["entry", "signal_flat"]);
    assert_eq!(report.stats.total_trades, 1);
    let trade = &report.stats.trades[0];
    assert_eq!(trade.entry_iteration, 2);
    assert_eq!(trade.exit_iteration, 6);
    assert_eq!(trade.exit_tag, "signal_flat");
    // 0.05% slippage on both sides
    assert_eq!(trade.pnl, dec!(-20));
    assert!(!broker.portfolio().await.has_position("AAPL"));
}

#[tokio::test]
async fn test_profit_levels_scale_out_against_remaining() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let mut config = config();
    config.risk.exits.base_take_pct = 0.5;
    let mut engine = engine(
        config,
        vec![long("long")],
        &[100.0, 100.0, 102.0, 104.0, 106.0],
        &broker,
        &store,
    );

    let report = engine.run().await;

    assert_eq!(
        sold_quantities(&store),
        vec![
            ("profit_level_1".to_string(), dec!(100)),
            ("profit_level_2".to_string(), dec!(50)),
            ("profit_level_3".to_string(), dec!(50)),
        ]
    );
    assert_eq!(report.stats.total_trades, 1);
    assert_eq!(report.stats.trades[0].pnl, dec!(700));
    assert_eq!(report.stats.trades[0].exit_tag, "profit_level_3");
    assert_ne!(engine.lifecycle("AAPL").unwrap().state(), SymbolState::Long);
}

#[tokio::test]
async fn test_stop_loss_closes_whole_position() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let mut engine = engine(
        config(),
        vec![long("long")],
        &[100.0, 100.0, 97.0],
        &broker,
        &store,
    );

    let report = engine.run().await;

    assert_eq!(order_tags(&store), vec!["entry", "stop_loss"]);
    assert_eq!(report.stats.trades[0].pnl, dec!(-600));
    assert_eq!(report.stats.losing_trades, 1);
    assert!(broker.portfolio().await.positions.is_empty());
}

#[tokio::test]
async fn test_failing_strategy_is_neutral_and_logged() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let strategies: Vec<Arc<dyn SignalStrategy>> = vec![long("long"), Arc::new(Failing)];
    let mut engine = engine(config(), strategies, &[100.0; 4], &broker, &store);

    let report = engine.run().await;

    assert_eq!(report.stats.iterations, 4);
    assert_eq!(report.stats.strategy_failures, 4);
    assert_eq!(count(&store, "strategy_failure"), 4);
    // 0.5 * 0.9 from the healthy strategy still clears the threshold
    assert_eq!(order_tags(&store), vec!["entry"]);
}

#[tokio::test]
async fn test_rejected_entry_leaves_portfolio_unchanged() {
    let broker = Arc::new(PaperBroker::new(dec!(10000)).with_slippage(dec!(1)));
    let store = Arc::new(MemoryStore::new());
    let mut config = config();
    config.initial_capital = dec!(10000);
    config.risk.max_risk_per_trade = dec!(0.5);
    config.risk.max_position_pct = dec!(1);
    config.risk.max_herfindahl = 1.0;
    let mut engine = engine(config, vec![long("long")], &[100.0; 3], &broker, &store);

    let report = engine.run().await;

    assert_eq!(report.stats.orders, 2);
    assert_eq!(report.stats.rejections, 2);
    assert_eq!(report.stats.fills, 0);
    assert_eq!(count(&store, "rejection"), 2);

    let portfolio = broker.portfolio().await;
    assert_eq!(portfolio.cash, dec!(10000));
    assert!(portfolio.positions.is_empty());
    assert_ne!(engine.lifecycle("AAPL").unwrap().state(), SymbolState::Long);
}

#[tokio::test]
async fn test_breaker_trips_once_and_blocks_until_reset() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let mut config = config();
    config.risk.breaker.max_position_loss_pct = dec!(0.05);
    config.risk.max_risk_per_trade = dec!(0.04);
    config.risk.exits.base_stop_pct = 0.2;
    let mut engine = engine(
        config,
        vec![long("long")],
        &[100.0, 100.0, 94.0, 94.0],
        &broker,
        &store,
    );

    let report = engine.run().await;

    assert!(report.breaker_triggered);
    assert!(report.breaker_reason.unwrap().contains("AAPL"));
    assert_eq!(count(&store, "circuit_breaker"), 1);
    // the breaker stops new entries, it does not liquidate
    assert_eq!(broker.portfolio().await.quantity("AAPL"), dec!(200));
    assert!(engine.status_board().snapshot().breaker_triggered);

    engine.reset_circuit_breaker();
    assert!(!engine.breaker_triggered());
    assert!(!engine.status_board().snapshot().breaker_triggered);
}

#[tokio::test]
async fn test_tripped_breaker_blocks_entries_but_not_exits() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let mut config = config();
    config.risk.breaker.max_position_loss_pct = dec!(0.05);
    config.risk.max_risk_per_trade = dec!(0.02);
    config.risk.exits.base_stop_pct = 0.08;
    let mut signals = vec![Signal::Long; 12];
    signals[3] = Signal::Flat;
    let closes = [
        100.0, 100.0, 94.0, 95.0, 95.0, 95.0, 95.0, 95.0, 89.0, 87.0, 87.0, 87.0,
    ];
    let strategies: Vec<Arc<dyn SignalStrategy>> = vec![Arc::new(Script { signals })];
    let mut engine = engine(config, strategies, &closes, &broker, &store);

    // entry at 100 with the stop at 92, then a 6% loss trips the breaker
    for _ in 0..3 {
        assert_eq!(engine.step().await, StepOutcome::Completed);
    }
    assert!(engine.breaker_triggered());
    assert_eq!(broker.portfolio().await.quantity("AAPL"), dec!(200));

    // the flat signal still closes the position
    engine.step().await;
    assert_eq!(order_tags(&store), vec!["entry", "signal_flat"]);
    assert!(!broker.portfolio().await.has_position("AAPL"));

    // a confirmed long on a flat symbol places no order
    for _ in 0..3 {
        engine.step().await;
    }
    let lifecycle = engine.lifecycle("AAPL").unwrap();
    assert_eq!(lifecycle.confirmations(), 3);
    assert_eq!(lifecycle.state(), SymbolState::Confirming);
    assert_eq!(order_tags(&store), vec!["entry", "signal_flat"]);

    engine.reset_circuit_breaker();
    engine.step().await;
    assert_eq!(engine.lifecycle("AAPL").unwrap().state(), SymbolState::Long);
    let trade = engine.lifecycle("AAPL").unwrap().trade().unwrap().clone();
    assert_eq!(trade.entry_price, dec!(95));
    assert_eq!(trade.stop, dec!(87.40));

    // trips again at 89, the stop at 87.40 still fires at 87
    engine.step().await;
    assert!(engine.breaker_triggered());
    engine.step().await;
    assert_eq!(
        order_tags(&store),
        vec!["entry", "signal_flat", "entry", "stop_loss"]
    );
    assert!(!broker.portfolio().await.has_position("AAPL"));

    let report = engine.run().await;
    assert_eq!(report.stats.iterations, 12);
    assert_eq!(report.stats.orders, 4);
    assert_eq!(count(&store, "circuit_breaker"), 2);
    let exits: Vec<&str> = report
        .stats
        .trades
        .iter()
        .map(|t| t.exit_tag.as_str())
        .collect();
    assert_eq!(exits, vec!["signal_flat", "stop_loss"]);
}

#[tokio::test]
async fn test_shutdown_cancels_before_orders() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let mut engine = engine(config(), vec![long("long")], &[100.0; 5], &broker, &store);

    assert_eq!(engine.step().await, StepOutcome::Completed);
    engine.shutdown_handle().store(true, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(engine.step().await, StepOutcome::Cancelled);

    let report = engine.run().await;
    assert_eq!(report.stop_reason, StopReason::Shutdown);
    assert_eq!(report.stats.orders, 0);
    assert_eq!(report.stats.iterations, 1);
}

#[tokio::test]
async fn test_iteration_limit() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let mut config = config();
    config.execution.max_iterations = Some(3);
    let mut engine = engine(config, vec![long("long")], &[100.0; 10], &broker, &store);

    let report = engine.run().await;
    assert_eq!(report.stop_reason, StopReason::IterationLimit);
    assert_eq!(report.stats.iterations, 3);
}

#[tokio::test]
async fn test_rewards_update_weights_and_persist() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
    let strategies: Vec<Arc<dyn SignalStrategy>> = vec![
        long("long"),
        Arc::new(Constant {
            name: "idle",
            signal: Signal::Flat,
            confidence: 0.0,
        }),
    ];
    let mut engine = engine(config(), strategies, &closes, &broker, &store);

    let report = engine.run().await;

    // first bar has nothing to settle
    assert_eq!(report.update_count, 9);
    let history = store.learning_history().unwrap();
    assert_eq!(history.len(), 9);
    assert_eq!(history.last().unwrap().update_count, 9);

    assert!(engine.ensemble().weight("long").unwrap() > 1.0);
    assert_eq!(engine.ensemble().weight("idle"), Some(1.0));
    assert!(report.final_weights["long"] > report.final_weights["idle"]);
}

#[tokio::test]
async fn test_resumes_weights_from_store() {
    let broker = zero_slippage();
    let mut weights = BTreeMap::new();
    weights.insert("long".to_string(), 2.5);
    weights.insert("retired".to_string(), 9.0);
    let state = LearningState {
        timestamp: chrono::Utc::now(),
        weights,
        params: TunedParams::new(),
        note: LearningState::tuned_week_note("2024-W01"),
        update_count: 42,
    };
    let store = Arc::new(MemoryStore::with_state(state));

    let engine = engine(config(), vec![long("long")], &[100.0], &broker, &store);

    assert_eq!(engine.ensemble().weight("long"), Some(2.5));
    assert!(!engine.ensemble().is_registered("retired"));
    assert_eq!(engine.ensemble().update_count(), 42);
    assert_eq!(engine.last_tuned_bucket(), Some("2024-W01"));
}

#[tokio::test]
async fn test_duplicate_strategy_names_rejected() {
    let broker = zero_slippage();
    let store = Arc::new(MemoryStore::new());
    let result = ExecutionEngine::with_strategies(
        config(),
        vec![long("same"), long("same")],
        broker,
        feed(&[100.0]),
        store,
    );
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registry_strategies_tune_and_resume_from_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let closes: Vec<f64> = (0..140)
        .map(|i| 100.0 + 5.0 * (i as f64 / 6.0).sin() + 0.05 * i as f64)
        .collect();

    let mut config = EngineConfig::default();
    config.tuner.min_history = 60;

    let report = {
        let store = Arc::new(JsonlStore::open(dir.path()).unwrap());
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let mut engine =
            ExecutionEngine::new(config.clone(), broker, feed(&closes), store.clone()).unwrap();
        assert_eq!(
            engine.strategy_names(),
            vec!["ma_crossover", "mean_reversion", "momentum", "rsi"]
        );

        let report = engine.run().await;
        let tuned = store
            .read_events()
            .unwrap()
            .iter()
            .filter(|e| e.kind.name() == "tuned")
            .count();
        assert!(tuned >= 1);
        report
    };

    assert_eq!(report.stats.iterations, 140);
    assert!(report.last_tuned_bucket.is_some());
    let var = report.stats.value_at_risk.unwrap();
    assert!(report.stats.conditional_var.unwrap() <= var);
    assert!(report.summary().contains("RUN REPORT"));

    let store = Arc::new(JsonlStore::open(dir.path()).unwrap());
    let latest = store.latest_learning_state().unwrap().unwrap();
    assert_eq!(latest.tuned_week(), report.last_tuned_bucket.as_deref());

    let resumed = ExecutionEngine::new(
        config,
        Arc::new(PaperBroker::new(dec!(100000))),
        feed(&[]),
        store,
    )
    .unwrap();
    assert_eq!(resumed.ensemble().update_count(), report.update_count);
    assert_eq!(resumed.last_tuned_bucket(), report.last_tuned_bucket.as_deref());
    assert_eq!(resumed.tuned_params(), &latest.params);
}
