//! Weekly parameter tuner.
//!
//! At most once per ISO week, each strategy's small parameter grid is scored
//! on recent history and the best candidate replaces the current parameters
//! only if it strictly beats them.

mod bucket;
mod tuner;

pub use bucket::iso_week_bucket;
pub use tuner::{StrategyTuneReport, TuneOutcome, TunerConfig, WeeklyTuner};
