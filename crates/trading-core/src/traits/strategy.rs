//! Strategy capability.

use crate::error::StrategyError;
use crate::types::{Bar, StrategyOutput, StrategyParams};

/// A signal-generating strategy.
///
/// Implementations must be pure: the same history always yields the same
/// output and no shared state is mutated, which lets the engine evaluate
/// strategies concurrently. A history shorter than [`lookback`](Self::lookback)
/// yields a neutral output rather than an error.
pub trait SignalStrategy: Send + Sync {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Evaluate the strategy on a price history (oldest bar first).
    fn evaluate(&self, history: &[Bar]) -> Result<StrategyOutput, StrategyError>;

    /// Current tunable parameters.
    fn params(&self) -> StrategyParams;

    /// Number of bars needed before the strategy can form an opinion.
    fn lookback(&self) -> usize;

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;

    struct LastCloseAbove {
        level: f64,
    }

    impl SignalStrategy for LastCloseAbove {
        fn name(&self) -> &str {
            "last_close_above"
        }

        fn evaluate(&self, history: &[Bar]) -> Result<StrategyOutput, StrategyError> {
            let Some(bar) = history.last() else {
                return Ok(StrategyOutput::neutral());
            };
            let signal = if bar.close > self.level {
                Signal::Long
            } else {
                Signal::Flat
            };
            Ok(StrategyOutput::new(signal, 1.0))
        }

        fn params(&self) -> StrategyParams {
            [("level".to_string(), self.level)].into_iter().collect()
        }

        fn lookback(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_strategy_object_safety() {
        let strategy: Box<dyn SignalStrategy> = Box::new(LastCloseAbove { level: 10.0 });
        let output = strategy.evaluate(&[Bar::flat(0, 11.0)]).unwrap();
        assert_eq!(output.signal, Signal::Long);
        assert_eq!(strategy.evaluate(&[]).unwrap(), StrategyOutput::neutral());
        assert_eq!(strategy.params()["level"], 10.0);
        assert_eq!(strategy.description(), "");
    }
}
