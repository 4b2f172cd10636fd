use async_trait::async_trait;

use crate::{Result, Series};

/// Abstraction over the exchange data connection.
///
/// `BinanceData` in `crates/scanner` implements this for live scanning;
/// tests substitute in-memory fakes. The scan scheduler is the only
/// component that should hold a `dyn MarketData`.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the most recent `lookback` candles for a (symbol, timeframe).
    /// Fails with `Error::DataUnavailable` on network failure or an
    /// unsupported symbol.
    async fn get_series(&self, symbol: &str, timeframe: &str, lookback: usize) -> Result<Series>;

    /// Latest traded price for a symbol.
    async fn current_price(&self, symbol: &str) -> Result<f64>;
}
