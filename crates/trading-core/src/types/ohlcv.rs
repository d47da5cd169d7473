//! OHLCV (Open, High, Low, Close, Volume) data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Compact OHLCV bar.
/// Uses f64 for fast indicator calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Bar {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume
    pub volume: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Create a bar whose OHLC values all equal `close`.
    pub fn flat(timestamp: i64, close: f64) -> Self {
        Self::new(timestamp, close, close, close, close, 0.0)
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// Simple return from `prev_close` to this bar's close.
    #[inline]
    pub fn return_since(&self, prev_close: f64) -> f64 {
        if prev_close == 0.0 {
            0.0
        } else {
            self.close / prev_close - 1.0
        }
    }
}

/// Bounded price history for one symbol.
#[derive(Debug, Clone)]
pub struct BarSeries {
    /// Symbol identifier
    pub symbol: String,
    bars: VecDeque<Bar>,
    /// Maximum capacity (0 = unlimited)
    capacity: usize,
}

impl BarSeries {
    /// Create a new empty bar series.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_capacity(symbol, 0)
    }

    /// Create a bar series with a maximum capacity.
    /// When capacity is reached, oldest bars are removed.
    pub fn with_capacity(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new bar, removing the oldest if at capacity.
    pub fn push(&mut self, bar: Bar) {
        if self.capacity > 0 && self.bars.len() >= self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Get the last bar.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Close of the bar before the last one.
    pub fn previous_close(&self) -> Option<f64> {
        let len = self.bars.len();
        if len < 2 {
            return None;
        }
        self.bars.get(len - 2).map(|b| b.close)
    }

    /// Extract close prices as a vector.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Copy the bars into a contiguous vector (oldest first).
    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.iter().copied().collect()
    }

    /// Get an iterator over the bars.
    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_return_since() {
        let bar = Bar::flat(1000, 102.0);
        assert!((bar.return_since(100.0) - 0.02).abs() < 1e-12);
        assert_eq!(bar.return_since(0.0), 0.0);
    }

    #[test]
    fn test_bar_datetime() {
        let bar = Bar::flat(86_400_000, 1.0);
        assert_eq!(bar.datetime().to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_bar_series_capacity() {
        let mut series = BarSeries::with_capacity("AAPL", 3);

        series.push(Bar::new(1, 100.0, 101.0, 99.0, 100.5, 1000.0));
        series.push(Bar::new(2, 100.5, 102.0, 100.0, 101.5, 1000.0));
        series.push(Bar::new(3, 101.5, 103.0, 101.0, 102.5, 1000.0));
        assert_eq!(series.len(), 3);

        // Should remove oldest when at capacity
        series.push(Bar::new(4, 102.5, 104.0, 102.0, 103.5, 1000.0));
        assert_eq!(series.len(), 3);
        assert_eq!(series.to_vec()[0].timestamp, 2);
        assert_eq!(series.previous_close(), Some(102.5));
    }

    #[test]
    fn test_bar_series_closes() {
        let mut series = BarSeries::new("AAPL");
        assert_eq!(series.previous_close(), None);
        series.push(Bar::new(1, 100.0, 101.0, 99.0, 100.5, 1000.0));
        series.push(Bar::new(2, 100.5, 102.0, 100.0, 101.5, 2000.0));

        assert_eq!(series.closes(), vec![100.5, 101.5]);
        assert_eq!(series.last().map(|b| b.timestamp), Some(2));
    }
}
