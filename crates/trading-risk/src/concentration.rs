//! Portfolio concentration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trading_core::convert::to_f64;

/// Concentration measures, shares taken against total portfolio value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConcentrationReport {
    /// Sum of squared position shares
    pub herfindahl_index: f64,
    /// Combined share of the three largest positions, in percent
    pub top3_concentration_pct: f64,
    /// Share of the largest position, in percent
    pub max_position_pct: f64,
}

/// Measure concentration of `position_values` within `total_value`.
///
/// Cash is part of `total_value`, so an all-cash portfolio reports zero.
pub fn concentration_risk(
    position_values: &BTreeMap<String, Decimal>,
    total_value: Decimal,
) -> ConcentrationReport {
    if total_value <= Decimal::ZERO {
        return ConcentrationReport::default();
    }
    let total = to_f64(total_value);

    let mut shares: Vec<f64> = position_values
        .values()
        .map(|v| to_f64(*v).max(0.0) / total)
        .collect();
    shares.sort_by(|a, b| b.total_cmp(a));

    ConcentrationReport {
        herfindahl_index: shares.iter().map(|s| s * s).sum(),
        top3_concentration_pct: shares.iter().take(3).sum::<f64>() * 100.0,
        max_position_pct: shares.first().copied().unwrap_or(0.0) * 100.0,
    }
}

/// Blocks entries that would push the Herfindahl index over a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationGate {
    /// Highest allowed post-trade Herfindahl index
    pub max_herfindahl: f64,
}

impl Default for ConcentrationGate {
    fn default() -> Self {
        Self {
            max_herfindahl: 0.3,
        }
    }
}

impl ConcentrationGate {
    pub fn new(max_herfindahl: f64) -> Self {
        Self { max_herfindahl }
    }

    /// Whether buying `proposed_value` more of `symbol` keeps concentration
    /// within the ceiling. Equity is unchanged by a buy (cash becomes stock).
    pub fn allows(
        &self,
        current: &BTreeMap<String, Decimal>,
        symbol: &str,
        proposed_value: Decimal,
        equity: Decimal,
    ) -> bool {
        let mut after = current.clone();
        *after.entry(symbol.to_string()).or_insert(Decimal::ZERO) += proposed_value;
        concentration_risk(&after, equity).herfindahl_index <= self.max_herfindahl
    }
}
