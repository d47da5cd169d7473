//! Bounded worker pool for strategy evaluation.
//!
//! Every (symbol, strategy) pair becomes one task. A semaphore bounds how many
//! evaluations run at once, each evaluation runs on the blocking pool under a
//! timeout, and results come back over a channel. The caller waits until every
//! task has answered.
//!
//! The permit lives inside the blocking closure, so an evaluation that overruns
//! its timeout keeps its slot until it actually returns. Waiting for a slot is
//! bounded by the same timeout, which turns a pool saturated by hung strategies
//! into neutral outputs instead of a stalled iteration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use trading_core::{Bar, SignalStrategy, StrategyOutput};

/// A strategy that could not produce an output for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFailure {
    pub symbol: String,
    pub strategy: String,
    pub error: String,
}

/// Outputs of one evaluation round.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Outputs by symbol, then by strategy. Failed strategies are neutral.
    pub outputs: BTreeMap<String, BTreeMap<String, StrategyOutput>>,
    /// Failures, ordered by symbol then strategy
    pub failures: Vec<EvaluationFailure>,
}

type TaskResult = (String, String, Result<StrategyOutput, String>);

/// Worker pool with a per-evaluation timeout.
#[derive(Debug, Clone)]
pub struct EvaluationPool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl EvaluationPool {
    pub fn new(workers: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate every strategy on every history.
    pub async fn evaluate(
        &self,
        strategies: &[Arc<dyn SignalStrategy>],
        histories: &BTreeMap<String, Arc<Vec<Bar>>>,
    ) -> Evaluation {
        let tasks = strategies.len() * histories.len();
        let (tx, mut rx) = mpsc::channel::<TaskResult>(tasks.max(1));

        for (symbol, history) in histories {
            for strategy in strategies {
                let tx = tx.clone();
                let permits = Arc::clone(&self.permits);
                let strategy = Arc::clone(strategy);
                let history = Arc::clone(history);
                let symbol = symbol.clone();
                let timeout = self.timeout;

                tokio::spawn(async move {
                    let name = strategy.name().to_string();
                    let result = run_one(permits, strategy, history, timeout).await;
                    let _ = tx.send((symbol, name, result)).await;
                });
            }
        }
        drop(tx);

        let mut evaluation = Evaluation::default();
        for symbol in histories.keys() {
            evaluation.outputs.insert(symbol.clone(), BTreeMap::new());
        }
        while let Some((symbol, strategy, result)) = rx.recv().await {
            let output = match result {
                Ok(output) => output,
                Err(error) => {
                    evaluation.failures.push(EvaluationFailure {
                        symbol: symbol.clone(),
                        strategy: strategy.clone(),
                        error,
                    });
                    StrategyOutput::neutral()
                }
            };
            evaluation
                .outputs
                .entry(symbol)
                .or_default()
                .insert(strategy, output);
        }
        evaluation
            .failures
            .sort_by(|a, b| (&a.symbol, &a.strategy).cmp(&(&b.symbol, &b.strategy)));
        evaluation
    }
}

async fn run_one(
    permits: Arc<Semaphore>,
    strategy: Arc<dyn SignalStrategy>,
    history: Arc<Vec<Bar>>,
    timeout: Duration,
) -> Result<StrategyOutput, String> {
    let permit = match tokio::time::timeout(timeout, permits.acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return Err("worker pool closed".to_string()),
        Err(_) => {
            return Err(format!(
                "no free worker within {}ms",
                timeout.as_millis()
            ))
        }
    };

    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        strategy.evaluate(&history)
    });
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(output))) => Ok(output),
        Ok(Ok(Err(err))) => Err(err.to_string()),
        Ok(Err(join)) if join.is_panic() => Err("strategy panicked".to_string()),
        Ok(Err(join)) => Err(join.to_string()),
        Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
    }
}
