//! Parameter map helpers and tuning grids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trading_core::{error::StrategyError, StrategyParams};

/// Candidate values per tunable parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    axes: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter axis.
    pub fn axis(mut self, name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        self.axes.insert(name.into(), values.into_iter().collect());
        self
    }

    /// Names of the tuned parameters.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(String::as_str)
    }

    /// Cartesian product of all axes, each candidate overlaid on `base`.
    pub fn candidates(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        let mut candidates = vec![base.clone()];
        for (name, values) in &self.axes {
            if values.is_empty() {
                continue;
            }
            candidates = candidates
                .iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), *value);
                        next
                    })
                })
                .collect();
        }
        candidates
    }

    /// Number of candidates in the product.
    pub fn len(&self) -> usize {
        self.axes
            .values()
            .filter(|v| !v.is_empty())
            .map(Vec::len)
            .product::<usize>()
            .max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.axes.values().all(Vec::is_empty)
    }
}

pub(crate) fn get_f64(
    params: &StrategyParams,
    key: &str,
    default: f64,
) -> Result<f64, StrategyError> {
    match params.get(key) {
        None => Ok(default),
        Some(value) if value.is_finite() => Ok(*value),
        Some(value) => Err(StrategyError::InvalidConfig(format!(
            "{key} must be finite, got {value}"
        ))),
    }
}

pub(crate) fn get_period(
    params: &StrategyParams,
    key: &str,
    default: usize,
) -> Result<usize, StrategyError> {
    let value = get_f64(params, key, default as f64)?;
    if value < 1.0 || value.fract() != 0.0 {
        return Err(StrategyError::InvalidConfig(format!(
            "{key} must be a positive whole number, got {value}"
        )));
    }
    Ok(value as usize)
}
