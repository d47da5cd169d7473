//! Market data feed trait.

use crate::error::DataError;
use crate::types::Bar;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Source of the latest bar per symbol, polled once per iteration.
#[async_trait]
pub trait MarketFeed: Send {
    /// Fetch the next set of bars keyed by symbol.
    ///
    /// Returns `Ok(None)` once the feed is exhausted. Symbols without a new
    /// bar are simply absent from the map.
    async fn poll(&mut self) -> Result<Option<BTreeMap<String, Bar>>, DataError>;
}
