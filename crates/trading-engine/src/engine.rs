//! The execution loop.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use trading_core::convert::to_decimal;
use trading_core::{
    Bar, BarSeries, Broker, Decision, EngineEvent, EventKind, Fill, LearningState, LearningStore,
    MarketFeed, Order, Portfolio, Side, Signal, SignalStrategy, TradingError, TunedParams,
};
use trading_ensemble::Ensemble;
use trading_monitor::{EngineStatus, PositionStatus, StatusBoard};
use trading_risk::{EntryBlock, EntryRequest, RiskManager};
use trading_strategies::StrategyRegistry;
use trading_tuner::{iso_week_bucket, WeeklyTuner};

use crate::{
    plan_exits, ClosedTrade, EngineConfig, EvaluationPool, ExitReason, OpenTrade, RewardTracker,
    RunReport, RunStats, StopReason, SymbolLifecycle, SymbolState,
};

/// Result of one call to [`ExecutionEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Iteration ran to completion
    Completed,
    /// The feed has no more bars
    Exhausted,
    /// Shutdown was requested before any order went out
    Cancelled,
}

/// Adaptive ensemble execution engine.
///
/// Owns the ensemble, the risk manager and the per-symbol lifecycles. The
/// broker, feed and store are the only collaborators it talks to.
pub struct ExecutionEngine {
    config: EngineConfig,
    registry: StrategyRegistry,
    strategies: Vec<Arc<dyn SignalStrategy>>,
    ensemble: Ensemble,
    risk: RiskManager,
    tuner: WeeklyTuner,
    pool: EvaluationPool,
    broker: Arc<dyn Broker>,
    feed: Box<dyn MarketFeed>,
    store: Arc<dyn LearningStore>,
    board: StatusBoard,
    shutdown: Arc<AtomicBool>,
    histories: BTreeMap<String, BarSeries>,
    lifecycles: BTreeMap<String, SymbolLifecycle>,
    rewards: RewardTracker,
    tuned_params: TunedParams,
    last_tuned_bucket: Option<String>,
    iteration: u64,
    clock: DateTime<Utc>,
    stats: RunStats,
}

impl ExecutionEngine {
    /// Create an engine running the registry strategies named in the config.
    pub fn new(
        config: EngineConfig,
        broker: Arc<dyn Broker>,
        feed: Box<dyn MarketFeed>,
        store: Arc<dyn LearningStore>,
    ) -> Result<Self, TradingError> {
        let strategies = StrategyRegistry::new().build_all(&config.strategies, &TunedParams::new())?;
        Self::with_strategies(config, strategies, broker, feed, store)
    }

    /// Create an engine running the given strategies.
    ///
    /// Only strategies known to the registry take part in weekly tuning.
    pub fn with_strategies(
        config: EngineConfig,
        strategies: Vec<Arc<dyn SignalStrategy>>,
        broker: Arc<dyn Broker>,
        feed: Box<dyn MarketFeed>,
        store: Arc<dyn LearningStore>,
    ) -> Result<Self, TradingError> {
        config.validate()?;
        if strategies.is_empty() {
            return Err(TradingError::Config("at least one strategy is required".into()));
        }

        let registry = StrategyRegistry::new();
        let mut ensemble = Ensemble::new(config.ensemble.clone())?;
        let mut tuned_params = TunedParams::new();
        for strategy in &strategies {
            let name = strategy.name();
            if ensemble.is_registered(name) {
                return Err(TradingError::Config(format!("duplicate strategy: {name}")));
            }
            ensemble.register(name);
            if registry.exists(name) {
                tuned_params.insert(name.to_string(), strategy.params());
            }
        }

        let pool = EvaluationPool::new(
            config.execution.worker_threads,
            Duration::from_millis(config.execution.strategy_timeout_ms),
        );
        let risk = RiskManager::new(config.risk.clone(), config.initial_capital);
        let tuner = WeeklyTuner::new(config.tuner.clone(), registry);
        let stats = RunStats::new(config.initial_capital);

        let mut engine = Self {
            config,
            registry,
            strategies,
            ensemble,
            risk,
            tuner,
            pool,
            broker,
            feed,
            store,
            board: StatusBoard::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            histories: BTreeMap::new(),
            lifecycles: BTreeMap::new(),
            rewards: RewardTracker::new(),
            tuned_params,
            last_tuned_bucket: None,
            iteration: 0,
            clock: DateTime::<Utc>::default(),
            stats,
        };
        engine.resume();
        Ok(engine)
    }

    /// Publish status to an existing board instead of a private one.
    pub fn with_status_board(mut self, board: StatusBoard) -> Self {
        self.board = board;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    /// Flag that stops the loop between iterations or before any order.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Operator action: re-arm the circuit breaker.
    pub fn reset_circuit_breaker(&mut self) {
        self.risk.reset_breaker();
        info!("Circuit breaker reset by operator");
        self.board.update(|status| {
            status.breaker_triggered = false;
            status.breaker_reason = None;
        });
    }

    pub fn breaker_triggered(&self) -> bool {
        self.risk.breaker().is_triggered()
    }

    /// Iterations started so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn lifecycle(&self, symbol: &str) -> Option<&SymbolLifecycle> {
        self.lifecycles.get(symbol)
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    /// Parameters of the tunable strategies currently in use.
    pub fn tuned_params(&self) -> &TunedParams {
        &self.tuned_params
    }

    pub fn last_tuned_bucket(&self) -> Option<&str> {
        self.last_tuned_bucket.as_deref()
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Run until the feed is exhausted, the iteration limit is reached or
    /// shutdown is requested.
    pub async fn run(&mut self) -> RunReport {
        info!(
            broker = self.broker.name(),
            strategies = ?self.strategy_names(),
            max_iterations = ?self.config.execution.max_iterations,
            "Starting execution loop"
        );
        self.board.update(|status| status.running = true);

        let stop_reason = loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break StopReason::Shutdown;
            }
            if let Some(limit) = self.config.execution.max_iterations {
                if self.iteration >= limit {
                    break StopReason::IterationLimit;
                }
            }
            match self.step().await {
                StepOutcome::Completed => {}
                StepOutcome::Exhausted => break StopReason::FeedExhausted,
                StepOutcome::Cancelled => break StopReason::Shutdown,
            }
        };

        self.board.update(|status| status.running = false);
        info!(iterations = self.iteration, reason = %stop_reason, "Execution loop stopped");
        self.report(stop_reason).await
    }

    /// Run one iteration.
    pub async fn step(&mut self) -> StepOutcome {
        let bars = match self.feed.poll().await {
            Ok(Some(bars)) => bars,
            Ok(None) => return StepOutcome::Exhausted,
            Err(err) => {
                // counts as an iteration so a failing feed still hits the limit
                warn!(error = %err, "Market feed poll failed");
                self.iteration += 1;
                return StepOutcome::Completed;
            }
        };
        self.iteration += 1;

        let bars: BTreeMap<String, Bar> = bars
            .into_iter()
            .filter(|(symbol, bar)| {
                let valid = bar.close.is_finite() && bar.close > 0.0;
                if !valid {
                    warn!(%symbol, close = bar.close, "Ignoring bar with invalid close");
                }
                valid
            })
            .collect();
        if let Some(ts) = bars.values().map(|b| b.timestamp).max() {
            self.clock = DateTime::from_timestamp_millis(ts).unwrap_or(self.clock);
        }

        self.maybe_tune().await;

        let capacity = self.config.execution.history_capacity;
        let mut closes = BTreeMap::new();
        let mut marks = BTreeMap::new();
        for (symbol, bar) in &bars {
            self.histories
                .entry(symbol.clone())
                .or_insert_with(|| BarSeries::with_capacity(symbol.clone(), capacity))
                .push(*bar);
            marks.insert(symbol.clone(), to_decimal(bar.close));
            closes.insert(symbol.clone(), bar.close);
        }
        self.broker.set_prices(&marks).await;

        let portfolio = self.broker.portfolio().await;
        let check = self.risk.check_breaker(
            portfolio.equity,
            portfolio.peak_equity,
            &portfolio.position_losses(),
        );
        if check.newly_triggered {
            let reason = check.reason.clone().unwrap_or_default();
            self.record(EventKind::CircuitBreaker { reason });
        }

        let decisions = self.evaluate(&closes).await;

        if self.shutdown.load(Ordering::SeqCst) {
            info!(iteration = self.iteration, "Shutdown requested, no orders this iteration");
            return StepOutcome::Cancelled;
        }

        for (symbol, decision) in &decisions {
            let Some(&close) = closes.get(symbol) else {
                continue;
            };
            self.process_symbol(symbol, to_decimal(close), decision, check.triggered)
                .await;
        }

        self.learn(&closes, &decisions);

        let portfolio = self.broker.portfolio().await;
        self.stats.iterations += 1;
        self.stats
            .record_equity(self.clock.timestamp_millis(), portfolio.equity);
        self.record(EventKind::Snapshot {
            cash: portfolio.cash,
            equity: portfolio.equity,
            positions: portfolio
                .positions
                .iter()
                .map(|(s, p)| (s.clone(), p.quantity))
                .collect(),
        });
        self.publish_status(&portfolio);

        StepOutcome::Completed
    }

    /// Final report from the current state.
    pub async fn report(&self, stop_reason: StopReason) -> RunReport {
        let portfolio = self.broker.portfolio().await;
        let mut stats = self.stats.clone();
        stats.finalize(&portfolio, &self.config.risk);
        let breaker = self.risk.breaker();

        RunReport {
            config: self.config.clone(),
            stats,
            final_portfolio: portfolio,
            final_weights: self.ensemble.normalized().clone(),
            update_count: self.ensemble.update_count(),
            breaker_triggered: breaker.is_triggered(),
            breaker_reason: breaker.reason().map(str::to_string),
            last_tuned_bucket: self.last_tuned_bucket.clone(),
            stop_reason,
        }
    }

    fn resume(&mut self) {
        let state = match self.store.latest_learning_state() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("No learning state to resume from");
                return;
            }
            Err(err) => {
                warn!(error = %err, "Failed to read learning state, starting fresh");
                return;
            }
        };

        let restored = self.ensemble.restore(&state.weights, state.update_count);
        for (name, params) in &state.params {
            if !self.tuned_params.contains_key(name) {
                continue;
            }
            match self.registry.build(name, params) {
                Ok(strategy) => {
                    self.tuned_params.insert(name.clone(), strategy.params());
                    self.replace_strategy(strategy);
                }
                Err(err) => {
                    warn!(strategy = %name, error = %err, "Ignoring persisted parameters");
                }
            }
        }
        self.last_tuned_bucket = state.tuned_week().map(str::to_string);

        info!(
            weights = restored,
            update_count = state.update_count,
            tuned_week = ?self.last_tuned_bucket,
            "Resumed learning state"
        );
    }

    fn replace_strategy(&mut self, strategy: Arc<dyn SignalStrategy>) {
        if let Some(slot) = self
            .strategies
            .iter_mut()
            .find(|s| s.name() == strategy.name())
        {
            *slot = strategy;
        }
    }

    async fn maybe_tune(&mut self) {
        if !self.config.tuner.enabled || self.tuned_params.is_empty() {
            return;
        }
        if self.last_tuned_bucket.as_deref() == Some(iso_week_bucket(&self.clock).as_str()) {
            return;
        }

        let history: BTreeMap<String, Vec<Bar>> = self
            .histories
            .iter()
            .map(|(symbol, series)| (symbol.clone(), series.to_vec()))
            .collect();
        let tuner = self.tuner.clone();
        let now = self.clock;
        let last_bucket = self.last_tuned_bucket.clone();
        let current = self.tuned_params.clone();

        let outcome = match tokio::task::spawn_blocking(move || {
            tuner.maybe_tune(now, last_bucket.as_deref(), &history, &current)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Tuning task failed");
                return;
            }
        };
        if !outcome.tuned {
            return;
        }

        for (name, params) in &outcome.params {
            if self.tuned_params.get(name) == Some(params) {
                continue;
            }
            match self.registry.build(name, params) {
                Ok(strategy) => {
                    self.replace_strategy(strategy);
                    self.tuned_params.insert(name.clone(), params.clone());
                }
                Err(err) => {
                    warn!(strategy = %name, error = %err, "Tuned parameters rejected, keeping current");
                }
            }
        }

        info!(bucket = %outcome.bucket, "Weekly tuning complete");
        self.last_tuned_bucket = Some(outcome.bucket.clone());
        self.record(EventKind::Tuned {
            bucket: outcome.bucket,
            params: self.tuned_params.clone(),
        });
        self.persist_learning_state();
    }

    async fn evaluate(&mut self, closes: &BTreeMap<String, f64>) -> BTreeMap<String, Decision> {
        let histories: BTreeMap<String, Arc<Vec<Bar>>> = closes
            .keys()
            .filter_map(|symbol| {
                self.histories
                    .get(symbol)
                    .map(|series| (symbol.clone(), Arc::new(series.to_vec())))
            })
            .collect();

        let evaluation = self.pool.evaluate(&self.strategies, &histories).await;

        for failure in evaluation.failures {
            warn!(
                symbol = %failure.symbol,
                strategy = %failure.strategy,
                error = %failure.error,
                "Strategy failed, using neutral output"
            );
            self.stats.strategy_failures += 1;
            self.record(EventKind::StrategyFailure {
                symbol: failure.symbol,
                strategy: failure.strategy,
                error: failure.error,
            });
        }

        let mut decisions = BTreeMap::new();
        for (symbol, outputs) in evaluation.outputs {
            let decision = self.ensemble.decide(&outputs);
            debug!(
                %symbol,
                signal = %decision.signal,
                score = decision.score,
                confidence = decision.confidence,
                "Ensemble decision"
            );
            if self.config.execution.log_decisions {
                self.record(EventKind::Decision {
                    symbol: symbol.clone(),
                    decision: decision.clone(),
                });
            }
            decisions.insert(symbol, decision);
        }
        decisions
    }

    async fn process_symbol(
        &mut self,
        symbol: &str,
        price: Decimal,
        decision: &Decision,
        breaker_triggered: bool,
    ) {
        let mut exited = false;

        let open = self.lifecycles.get(symbol).and_then(|l| l.trade()).cloned();
        if let Some(trade) = open {
            let remaining = self.broker.portfolio().await.quantity(symbol);
            if remaining <= Decimal::ZERO {
                warn!(%symbol, "Broker holds no shares for an open trade, marking flat");
                if let Some(lifecycle) = self.lifecycles.get_mut(symbol) {
                    lifecycle.close();
                }
                return;
            }

            let plan = plan_exits(&trade, price, remaining, self.iteration, &self.config.execution);
            if let Some(reason) = plan.protective {
                self.sell(symbol, remaining, reason).await;
                return;
            }
            for tranche in plan.tranches {
                exited = true;
                self.sell(symbol, tranche.quantity, ExitReason::ProfitLevel(tranche.level))
                    .await;
            }
            if plan.time_exit {
                exited = true;
                let remaining = self.broker.portfolio().await.quantity(symbol);
                if remaining > Decimal::ZERO {
                    self.sell(symbol, remaining, ExitReason::TimeExit).await;
                }
            }
        }

        let confirm_bars = self.config.execution.confirm_bars;
        let lifecycle = self.lifecycles.entry(symbol.to_string()).or_default();
        let confirmed = lifecycle.observe(decision.signal, confirm_bars);
        let is_long = lifecycle.is_long();

        if !is_long && confirmed && !exited {
            if breaker_triggered {
                debug!(%symbol, "Entry blocked by circuit breaker");
            } else {
                self.enter(symbol, price).await;
            }
            return;
        }

        if is_long && !exited {
            let reason = match decision.signal {
                Signal::Flat => Some(ExitReason::SignalFlat),
                Signal::Short => Some(ExitReason::SignalReverse),
                Signal::Long => None,
            };
            if let Some(reason) = reason {
                let remaining = self.broker.portfolio().await.quantity(symbol);
                if remaining > Decimal::ZERO {
                    self.sell(symbol, remaining, reason).await;
                }
            }
        }
    }

    async fn enter(&mut self, symbol: &str, price: Decimal) {
        let portfolio = self.broker.portfolio().await;
        if portfolio.has_position(symbol) {
            return;
        }

        let closes = self
            .histories
            .get(symbol)
            .map(|series| series.closes())
            .unwrap_or_default();
        let position_values = portfolio.position_values();
        let trade_returns = self.stats.trade_returns();
        let request = EntryRequest {
            symbol,
            entry: price,
            closes: &closes,
            equity: portfolio.equity,
            cash: portfolio.cash,
            position_values: &position_values,
            trade_returns: &trade_returns,
        };

        let plan = match self.risk.plan_entry(&request) {
            Ok(plan) => plan,
            Err(EntryBlock::Invalid(err)) => {
                debug!(%symbol, error = %err, "Entry skipped, invalid sizing inputs");
                return;
            }
            Err(block) => {
                debug!(%symbol, ?block, "Entry blocked");
                return;
            }
        };

        let shares = Decimal::from(plan.shares);
        let order = Order::market(symbol, Side::Buy, shares, "entry", self.clock)
            .with_levels(plan.levels.stop, plan.levels.take);
        let Some(fill) = self.submit(order).await else {
            return;
        };

        let mut trade = OpenTrade::new(
            fill.price,
            fill.quantity,
            plan.levels.stop,
            plan.levels.take,
            self.iteration,
            self.clock,
            self.config.execution.profit_levels.len(),
        );
        trade.realized_pnl -= fill.commission;
        info!(
            %symbol,
            shares = %fill.quantity,
            price = %fill.price,
            stop = %plan.levels.stop,
            take = %plan.levels.take,
            "Entered long"
        );
        self.lifecycles
            .entry(symbol.to_string())
            .or_default()
            .open(trade);
    }

    async fn sell(&mut self, symbol: &str, quantity: Decimal, reason: ExitReason) {
        let order = Order::market(symbol, Side::Sell, quantity, reason.tag(), self.clock);
        let Some(fill) = self.submit(order).await else {
            return;
        };
        let remaining = self.broker.portfolio().await.quantity(symbol);

        let Some(lifecycle) = self.lifecycles.get_mut(symbol) else {
            return;
        };
        if let Some(trade) = lifecycle.trade_mut() {
            trade.record_sale(fill.quantity, fill.price, fill.commission);
            if let ExitReason::ProfitLevel(level) = reason {
                if let Some(taken) = trade.levels_taken.get_mut(level) {
                    *taken = true;
                }
            }
        }
        if remaining > Decimal::ZERO {
            return;
        }
        if let Some(trade) = lifecycle.close() {
            let closed = ClosedTrade::from_trade(symbol, &trade, self.clock, self.iteration, &fill.tag);
            info!(
                %symbol,
                pnl = %closed.pnl,
                return_pct = closed.return_pct,
                exit = %closed.exit_tag,
                "Position closed"
            );
            self.stats.add_trade(closed);
        }
    }

    async fn submit(&mut self, order: Order) -> Option<Fill> {
        let symbol = order.symbol.clone();
        self.stats.orders += 1;
        self.record(EventKind::Order {
            order: order.clone(),
        });

        match self.broker.submit_order(&order).await {
            Ok(fill) => {
                info!(
                    %symbol,
                    side = %fill.side,
                    quantity = %fill.quantity,
                    price = %fill.price,
                    tag = %fill.tag,
                    "Order filled"
                );
                self.stats.fills += 1;
                self.record(EventKind::Fill { fill: fill.clone() });
                Some(fill)
            }
            Err(rejection) => {
                warn!(
                    %symbol,
                    side = %order.side,
                    quantity = %order.quantity,
                    tag = %order.tag,
                    reason = %rejection.reason,
                    "Order rejected: {}",
                    rejection.message
                );
                self.stats.rejections += 1;
                self.record(EventKind::Rejection { rejection });
                None
            }
        }
    }

    fn learn(&mut self, closes: &BTreeMap<String, f64>, decisions: &BTreeMap<String, Decision>) {
        let rewards = self
            .rewards
            .settle(closes, self.ensemble.config().reward_scale);
        for (symbol, decision) in decisions {
            if let Some(&close) = closes.get(symbol) {
                self.rewards.record(symbol, close, decision.long_voters());
            }
        }
        if rewards.is_empty() {
            return;
        }

        self.ensemble.update(&rewards);
        self.stats.weight_updates += 1;
        debug!(
            update_count = self.ensemble.update_count(),
            rewards = ?rewards,
            "Ensemble weights updated"
        );
        self.persist_learning_state();
    }

    fn learning_state(&self) -> LearningState {
        LearningState {
            timestamp: self.clock,
            weights: self.ensemble.weights().clone(),
            params: self.tuned_params.clone(),
            note: self
                .last_tuned_bucket
                .as_deref()
                .map(LearningState::tuned_week_note)
                .unwrap_or_default(),
            update_count: self.ensemble.update_count(),
        }
    }

    fn persist_learning_state(&self) {
        if let Err(err) = self.store.log_learning_state(&self.learning_state()) {
            warn!(error = %err, "Failed to persist learning state");
        }
    }

    fn record(&self, kind: EventKind) {
        let event = EngineEvent::new(self.clock, self.iteration, kind);
        if let Err(err) = self.store.append_event(&event) {
            warn!(event = event.kind.name(), error = %err, "Failed to append event");
        }
    }

    fn publish_status(&self, portfolio: &Portfolio) {
        let positions = portfolio
            .positions
            .iter()
            .map(|(symbol, position)| {
                let state = self
                    .lifecycles
                    .get(symbol)
                    .map(SymbolLifecycle::state)
                    .unwrap_or(SymbolState::Flat);
                (
                    symbol.clone(),
                    PositionStatus {
                        quantity: position.quantity,
                        avg_entry_price: position.avg_entry_price,
                        current_price: position.current_price,
                        unrealized_pnl: position.unrealized_pnl,
                        stop_loss: position.stop_loss,
                        take_profit: position.take_profit,
                        state: state.to_string(),
                    },
                )
            })
            .collect();
        let breaker = self.risk.breaker();

        self.board.publish(EngineStatus {
            running: true,
            iteration: self.iteration,
            timestamp: Some(self.clock),
            cash: portfolio.cash,
            equity: portfolio.equity,
            peak_equity: portfolio.peak_equity,
            positions,
            weights: self.ensemble.normalized().clone(),
            update_count: self.ensemble.update_count(),
            breaker_triggered: breaker.is_triggered(),
            breaker_reason: breaker.reason().map(str::to_string),
            last_tuned_bucket: self.last_tuned_bucket.clone(),
        });
    }
}
