use async_trait::async_trait;

use crate::{Candle, MarketSnapshot, Result};

/// Abstraction over the market-data collaborator (REST/WebSocket client,
/// recorded files, ...).
///
/// Implementations must return candles strictly ordered by open-time with no
/// duplicates, and report the latest trade or mid price as the current price.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// The most recent `limit` closed candles for `symbol`, oldest first.
    async fn candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Live ticker snapshot for `symbol`.
    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot>;
}
