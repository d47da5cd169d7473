//! Replay of historical bars as a live feed.

use async_trait::async_trait;
use std::collections::BTreeMap;
use trading_core::error::DataError;
use trading_core::traits::MarketFeed;
use trading_core::types::Bar;

/// Replays per-symbol bar vectors in timestamp order.
///
/// Each poll returns the bars sharing the next earliest timestamp, so symbols
/// with gaps are simply absent from that poll.
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    series: BTreeMap<String, Vec<Bar>>,
    cursors: BTreeMap<String, usize>,
}

impl ReplayFeed {
    /// Create a feed. Each series is sorted by timestamp.
    pub fn new(mut series: BTreeMap<String, Vec<Bar>>) -> Self {
        for bars in series.values_mut() {
            bars.sort_by_key(|b| b.timestamp);
        }
        let cursors = series.keys().map(|s| (s.clone(), 0)).collect();
        Self { series, cursors }
    }

    /// Symbols in the feed.
    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    /// Number of distinct timestamps not yet replayed.
    pub fn remaining(&self) -> usize {
        let mut timestamps: Vec<i64> = self
            .series
            .iter()
            .flat_map(|(symbol, bars)| {
                let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
                bars[cursor.min(bars.len())..].iter().map(|b| b.timestamp)
            })
            .collect();
        timestamps.sort_unstable();
        timestamps.dedup();
        timestamps.len()
    }

    fn next_timestamp(&self) -> Option<i64> {
        self.series
            .iter()
            .filter_map(|(symbol, bars)| {
                let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
                bars.get(cursor).map(|b| b.timestamp)
            })
            .min()
    }

    /// Synchronous form of [`MarketFeed::poll`].
    pub fn next_bars(&mut self) -> Option<BTreeMap<String, Bar>> {
        let timestamp = self.next_timestamp()?;
        let mut bars = BTreeMap::new();
        for (symbol, series) in &self.series {
            let cursor = self.cursors.entry(symbol.clone()).or_insert(0);
            if let Some(bar) = series.get(*cursor) {
                if bar.timestamp == timestamp {
                    bars.insert(symbol.clone(), *bar);
                    *cursor += 1;
                }
            }
        }
        Some(bars)
    }
}

#[async_trait]
impl MarketFeed for ReplayFeed {
    async fn poll(&mut self) -> Result<Option<BTreeMap<String, Bar>>, DataError> {
        Ok(self.next_bars())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> BTreeMap<String, Vec<Bar>> {
        let mut series = BTreeMap::new();
        series.insert(
            "AAA".to_string(),
            vec![Bar::flat(1, 10.0), Bar::flat(2, 11.0), Bar::flat(3, 12.0)],
        );
        series.insert(
            "BBB".to_string(),
            vec![Bar::flat(3, 21.0), Bar::flat(1, 20.0)],
        );
        series
    }

    #[tokio::test]
    async fn test_replay_aligns_by_timestamp() {
        let mut feed = ReplayFeed::new(series());
        assert_eq!(feed.remaining(), 3);

        let first = feed.poll().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first["BBB"].close, 20.0);

        let second = feed.poll().await.unwrap().unwrap();
        assert_eq!(second.keys().collect::<Vec<_>>(), vec!["AAA"]);

        let third = feed.poll().await.unwrap().unwrap();
        assert_eq!(third["AAA"].close, 12.0);
        assert_eq!(third["BBB"].close, 21.0);

        assert!(feed.poll().await.unwrap().is_none());
        assert_eq!(feed.remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_feed_is_exhausted() {
        let mut feed = ReplayFeed::new(BTreeMap::new());
        assert!(feed.poll().await.unwrap().is_none());
    }
}
