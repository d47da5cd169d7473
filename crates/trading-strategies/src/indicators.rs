//! Minimal indicator helpers shared by the reference strategies.

/// Simple moving average of the last `period` values.
pub(crate) fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Mean and population standard deviation of the last `period` values.
pub(crate) fn mean_std(values: &[f64], period: usize) -> Option<(f64, f64)> {
    let mean = sma(values, period)?;
    let window = &values[values.len() - period..];
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
    Some((mean, variance.sqrt()))
}

/// Rate of change over `period` bars.
pub(crate) fn rate_of_change(values: &[f64], period: usize) -> Option<f64> {
    if values.len() < period + 1 {
        return None;
    }
    let current = *values.last()?;
    let past = values[values.len() - period - 1];
    if past == 0.0 {
        return None;
    }
    Some((current - past) / past)
}

/// Wilder-smoothed RSI of the full series, last value only.
pub(crate) fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f64 = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period_f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period_f64;

    for change in &changes[period..] {
        avg_gain = (avg_gain * (period_f64 - 1.0) + change.max(0.0)) / period_f64;
        avg_loss = (avg_loss * (period_f64 - 1.0) + (-change).max(0.0)) / period_f64;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}
