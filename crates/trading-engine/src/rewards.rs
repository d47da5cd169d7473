//! Rewards for strategies that voted long on the previous bar.

use std::collections::BTreeMap;
use trading_ensemble::squash_reward;

#[derive(Debug, Clone, PartialEq)]
struct PendingVote {
    close: f64,
    voters: Vec<String>,
}

/// Remembers who voted long and at what close, until the next bar settles it.
#[derive(Debug, Clone, Default)]
pub struct RewardTracker {
    pending: BTreeMap<String, PendingVote>,
}

impl RewardTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the long voters for `symbol` at `close`.
    pub fn record<'a>(
        &mut self,
        symbol: &str,
        close: f64,
        voters: impl IntoIterator<Item = &'a str>,
    ) {
        let voters: Vec<String> = voters.into_iter().map(str::to_string).collect();
        if voters.is_empty() {
            self.pending.remove(symbol);
            return;
        }
        self.pending
            .insert(symbol.to_string(), PendingVote { close, voters });
    }

    /// Votes waiting to be settled.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Settle all pending votes against the new closes.
    ///
    /// Each long voter is rewarded with its average next-bar return across the
    /// symbols it voted on, squashed into [0, 1]. Votes on symbols without a
    /// new close are dropped.
    pub fn settle(&mut self, closes: &BTreeMap<String, f64>, scale: f64) -> BTreeMap<String, f64> {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for (symbol, vote) in std::mem::take(&mut self.pending) {
            let Some(&close) = closes.get(&symbol) else {
                continue;
            };
            if vote.close <= 0.0 || !close.is_finite() {
                continue;
            }
            let ret = close / vote.close - 1.0;
            for voter in vote.voters {
                let entry = sums.entry(voter).or_insert((0.0, 0));
                entry.0 += ret;
                entry.1 += 1;
            }
        }

        sums.into_iter()
            .map(|(name, (sum, count))| (name, squash_reward(sum / count as f64, scale)))
            .collect()
    }
}
