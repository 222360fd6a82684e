use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Duration;

use common::{Candle, Error, MarketDataSource, MarketSnapshot, Result};

/// Candles recorded as `{dir}/{SYMBOL}.json`, a JSON array of candles.
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn load(&self, symbol: &str) -> Result<Vec<Candle>> {
        let path = self.dir.join(format!("{symbol}.json"));
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::MarketData(format!("cannot read {}: {e}", path.display())))?;
        let candles: Vec<Candle> = serde_json::from_slice(&raw)?;

        if let Some(pair) = candles.windows(2).find(|w| w[1].open_time <= w[0].open_time) {
            return Err(Error::MarketData(format!(
                "{}: candles out of order at {}",
                path.display(),
                pair[1].open_time
            )));
        }
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataSource for FileSource {
    async fn candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let mut candles = self.load(symbol).await?;
        let excess = candles.len().saturating_sub(limit);
        candles.drain(..excess);
        Ok(candles)
    }

    /// Snapshot of the last recorded candle; 24h figures cover the candles
    /// opened within a day of it.
    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let candles = self.load(symbol).await?;
        let last = candles
            .last()
            .ok_or_else(|| Error::MarketData(format!("no candles recorded for {symbol}")))?;
        let since = last.open_time - Duration::hours(24);
        let day: Vec<&Candle> = candles.iter().filter(|c| c.open_time > since).collect();

        let first_open = day.first().map_or(last.open, |c| c.open);
        let change = if first_open != 0.0 {
            (last.close - first_open) / first_open * 100.0
        } else {
            0.0
        };
        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            timestamp: last.open_time,
            bid_price: last.close,
            ask_price: last.close,
            last_price: last.close,
            volume_24h: day.iter().map(|c| c.volume).sum(),
            high_24h: day.iter().map(|c| c.high).fold(f64::MIN, f64::max),
            low_24h: day.iter().map(|c| c.low).fold(f64::MAX, f64::min),
            price_change_percent_24h: change,
        })
    }
}
