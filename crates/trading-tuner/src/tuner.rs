//! Bounded grid search gated by ISO week.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use trading_core::{error::StrategyError, Bar, SignalStrategy, StrategyParams, TunedParams};
use trading_strategies::StrategyRegistry;

use crate::iso_week_bucket;

/// Tuner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Run the tuner at all
    pub enabled: bool,
    /// Bars a symbol needs before it is used for scoring
    pub min_history: usize,
    /// Only the most recent bars are scored
    pub max_history: usize,
    /// Score strategies on the rayon pool
    pub parallel: bool,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_history: 60,
            max_history: 500,
            parallel: true,
        }
    }
}

/// Result of tuning one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyTuneReport {
    /// Score of the parameters in effect before tuning
    pub baseline_score: Option<f64>,
    /// Score of the selected parameters
    pub best_score: Option<f64>,
    /// Candidates that were scored successfully
    pub candidates_scored: usize,
    /// Whether the parameters changed
    pub changed: bool,
    /// Error that stopped tuning this strategy
    pub error: Option<String>,
}

/// Result of [`WeeklyTuner::maybe_tune`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneOutcome {
    /// Whether a tuning pass ran for this bucket
    pub tuned: bool,
    /// Parameters to use from now on
    pub params: TunedParams,
    /// ISO week bucket of `now`
    pub bucket: String,
    /// Per-strategy results, empty when not tuned
    pub reports: BTreeMap<String, StrategyTuneReport>,
}

/// Weekly parameter tuner.
#[derive(Debug, Clone, Default)]
pub struct WeeklyTuner {
    config: TunerConfig,
    registry: StrategyRegistry,
}

impl WeeklyTuner {
    pub fn new(config: TunerConfig, registry: StrategyRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Tune once per ISO week.
    ///
    /// Returns `tuned = false` with the current parameters when `now` is in
    /// `last_bucket`, when tuning is disabled, or when no symbol has enough
    /// history. In the last case the bucket is not consumed.
    pub fn maybe_tune(
        &self,
        now: DateTime<Utc>,
        last_bucket: Option<&str>,
        history: &BTreeMap<String, Vec<Bar>>,
        current_params: &TunedParams,
    ) -> TuneOutcome {
        let bucket = iso_week_bucket(&now);
        let unchanged = |bucket: String| TuneOutcome {
            tuned: false,
            params: current_params.clone(),
            bucket,
            reports: BTreeMap::new(),
        };

        if !self.config.enabled || last_bucket == Some(bucket.as_str()) {
            return unchanged(bucket);
        }

        let series: Vec<&[Bar]> = history
            .values()
            .filter(|bars| bars.len() >= self.config.min_history)
            .map(|bars| {
                let start = bars.len().saturating_sub(self.config.max_history);
                &bars[start..]
            })
            .collect();
        if series.is_empty() {
            debug!(%bucket, min_history = self.config.min_history, "Not enough history to tune");
            return unchanged(bucket);
        }

        let tune = |(name, params): (&String, &StrategyParams)| {
            let (params, report) = self.tune_strategy(name, params, &series);
            (name.clone(), params, report)
        };
        let results: Vec<(String, StrategyParams, StrategyTuneReport)> = if self.config.parallel {
            current_params.par_iter().map(tune).collect()
        } else {
            current_params.iter().map(tune).collect()
        };

        let mut params = TunedParams::new();
        let mut reports = BTreeMap::new();
        for (name, tuned, report) in results {
            if let Some(error) = &report.error {
                warn!(strategy = %name, %error, "Tuning failed, keeping parameters");
            } else if report.changed {
                info!(
                    strategy = %name,
                    baseline = ?report.baseline_score,
                    best = ?report.best_score,
                    params = ?tuned,
                    "Strategy retuned"
                );
            }
            params.insert(name.clone(), tuned);
            reports.insert(name, report);
        }

        info!(%bucket, strategies = reports.len(), "Weekly tuning complete");
        TuneOutcome {
            tuned: true,
            params,
            bucket,
            reports,
        }
    }

    fn tune_strategy(
        &self,
        name: &str,
        current: &StrategyParams,
        series: &[&[Bar]],
    ) -> (StrategyParams, StrategyTuneReport) {
        let mut report = StrategyTuneReport {
            baseline_score: None,
            best_score: None,
            candidates_scored: 0,
            changed: false,
            error: None,
        };

        let grid = match self.registry.param_grid(name) {
            Ok(grid) => grid,
            Err(e) => {
                report.error = Some(e.to_string());
                return (current.clone(), report);
            }
        };

        let mut best_params = current.clone();
        let mut best_score = self.score_params(name, current, series).ok();
        report.baseline_score = best_score;

        for candidate in grid.candidates(current) {
            if &candidate == current {
                continue;
            }
            let score = match self.score_params(name, &candidate, series) {
                Ok(score) => score,
                Err(e) => {
                    debug!(strategy = %name, params = ?candidate, error = %e, "Candidate skipped");
                    continue;
                }
            };
            report.candidates_scored += 1;
            if best_score.map_or(true, |best| score > best) {
                best_score = Some(score);
                best_params = candidate;
            }
        }

        report.best_score = best_score;
        report.changed = &best_params != current;
        (best_params, report)
    }

    fn score_params(
        &self,
        name: &str,
        params: &StrategyParams,
        series: &[&[Bar]],
    ) -> Result<f64, StrategyError> {
        let strategy = self.registry.build(name, params)?;
        series
            .iter()
            .map(|bars| score_series(strategy.as_ref(), bars))
            .sum()
    }
}

/// Sum of next-bar returns times the lagged signal.
fn score_series(strategy: &dyn SignalStrategy, bars: &[Bar]) -> Result<f64, StrategyError> {
    let mut score = 0.0;
    for t in strategy.lookback().max(1)..bars.len() {
        let signal = strategy.evaluate(&bars[..t])?.signal;
        score += bars[t].return_since(bars[t - 1].close) * signal.as_f64();
    }
    Ok(score)
}
