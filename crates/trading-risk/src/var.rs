//! Value at Risk and Expected Shortfall.
//!
//! Results are return quantiles: a loss is a negative number.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use trading_core::error::RiskError;

/// Minimum observations for the empirical quantile.
const MIN_HISTORICAL: usize = 100;
/// Minimum observations for the parametric estimators.
const MIN_PARAMETRIC: usize = 30;

/// VaR estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VarMethod {
    /// Empirical quantile of the observed returns
    #[default]
    Historical,
    /// Normal quantile from mean and standard deviation
    Gaussian,
    /// Normal quantile adjusted for skewness and excess kurtosis
    CornishFisher,
}

impl VarMethod {
    fn min_points(self) -> usize {
        match self {
            VarMethod::Historical => MIN_HISTORICAL,
            VarMethod::Gaussian | VarMethod::CornishFisher => MIN_PARAMETRIC,
        }
    }
}

/// Return threshold that losses exceed with probability `1 - confidence`.
pub fn value_at_risk(returns: &[f64], confidence: f64, method: VarMethod) -> Result<f64, RiskError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(RiskError::InvalidInput(format!(
            "confidence must be in (0, 1), got {confidence}"
        )));
    }
    let required = method.min_points();
    if returns.len() < required {
        return Err(RiskError::InsufficientData {
            required,
            available: returns.len(),
        });
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(RiskError::InvalidInput("returns must be finite".into()));
    }

    let tail = 1.0 - confidence;
    match method {
        VarMethod::Historical => {
            let mut sorted = returns.to_vec();
            sorted.sort_by(f64::total_cmp);
            let index = ((tail * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
            Ok(sorted[index])
        }
        VarMethod::Gaussian => {
            let moments = Moments::of(returns);
            Ok(moments.mean + standard_quantile(tail)? * moments.std)
        }
        VarMethod::CornishFisher => {
            let moments = Moments::of(returns);
            let z = standard_quantile(tail)?;
            let s = moments.skewness;
            let k = moments.excess_kurtosis;
            let z_cf = z
                + (z * z - 1.0) * s / 6.0
                + (z.powi(3) - 3.0 * z) * k / 24.0
                - (2.0 * z.powi(3) - 5.0 * z) * s * s / 36.0;
            Ok(moments.mean + z_cf * moments.std)
        }
    }
}

/// Expected Shortfall: mean of the returns at or below the VaR threshold.
pub fn conditional_var(
    returns: &[f64],
    confidence: f64,
    method: VarMethod,
) -> Result<f64, RiskError> {
    let threshold = value_at_risk(returns, confidence, method)?;
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= threshold).collect();
    if tail.is_empty() {
        return Ok(threshold);
    }
    Ok(tail.iter().sum::<f64>() / tail.len() as f64)
}

fn standard_quantile(p: f64) -> Result<f64, RiskError> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| RiskError::InvalidInput(e.to_string()))?;
    Ok(normal.inverse_cdf(p))
}

struct Moments {
    mean: f64,
    std: f64,
    skewness: f64,
    excess_kurtosis: f64,
}

impl Moments {
    fn of(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let central = |power: i32| values.iter().map(|v| (v - mean).powi(power)).sum::<f64>() / n;
        let variance = central(2);
        let std = variance.sqrt();
        if std <= f64::EPSILON {
            return Self {
                mean,
                std: 0.0,
                skewness: 0.0,
                excess_kurtosis: 0.0,
            };
        }
        Self {
            mean,
            std,
            skewness: central(3) / std.powi(3),
            excess_kurtosis: central(4) / variance.powi(2) - 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_returns(n: usize) -> Vec<f64> {
        // -0.05 .. +0.05 in even steps
        (0..n)
            .map(|i| -0.05 + 0.1 * i as f64 / (n - 1) as f64)
            .collect()
    }

    fn wave_returns(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64 * 0.7).sin() * 0.02).collect()
    }

    #[test]
    fn test_historical_var_is_empirical_quantile() {
        let returns = uniform_returns(101);
        let var = value_at_risk(&returns, 0.95, VarMethod::Historical).unwrap();
        // floor(0.05 * 101) = 5 -> sixth smallest
        assert!((var - returns[5]).abs() < 1e-12);
        assert!(var < 0.0);
    }

    #[test]
    fn test_historical_needs_100_points() {
        let err = value_at_risk(&uniform_returns(50), 0.95, VarMethod::Historical).unwrap_err();
        assert_eq!(
            err,
            RiskError::InsufficientData {
                required: 100,
                available: 50
            }
        );
        assert!(value_at_risk(&uniform_returns(50), 0.95, VarMethod::Gaussian).is_ok());
        assert!(value_at_risk(&uniform_returns(20), 0.95, VarMethod::Gaussian).is_err());
    }

    #[test]
    fn test_invalid_confidence() {
        let returns = wave_returns(200);
        assert!(matches!(
            value_at_risk(&returns, 1.0, VarMethod::Gaussian),
            Err(RiskError::InvalidInput(_))
        ));
        assert!(value_at_risk(&returns, 0.0, VarMethod::Historical).is_err());
    }

    #[test]
    fn test_gaussian_var() {
        let returns = wave_returns(500);
        let moments = Moments::of(&returns);
        let var = value_at_risk(&returns, 0.95, VarMethod::Gaussian).unwrap();
        let expected = moments.mean - 1.6448536269514722 * moments.std;
        assert!((var - expected).abs() < 1e-6);
    }

    #[test]
    fn test_cornish_fisher_matches_gaussian_for_symmetric_returns() {
        let returns: Vec<f64> = (0..200)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let gaussian = value_at_risk(&returns, 0.99, VarMethod::Gaussian).unwrap();
        let cf = value_at_risk(&returns, 0.99, VarMethod::CornishFisher).unwrap();
        // Zero skew, negative excess kurtosis: thinner tail than the normal
        assert!(cf > gaussian);
    }

    #[test]
    fn test_conditional_var_is_worse_than_var() {
        let returns = uniform_returns(200);
        let var = value_at_risk(&returns, 0.95, VarMethod::Historical).unwrap();
        let cvar = conditional_var(&returns, 0.95, VarMethod::Historical).unwrap();
        assert!(cvar <= var);
    }
}
