use async_trait::async_trait;

use crate::{BarRequest, BarSet, ChartSeries, Result, SymbolCatalog};

/// Abstraction over a charting backend that can deliver recent OHLC bars.
///
/// `TradingViewClient` in `crates/market` implements this against the live
/// chart websocket. Tests substitute an in-memory implementation.
#[async_trait]
pub trait ChartProvider: Send + Sync {
    /// Fetch the most recent bars for `request.symbol`, oldest first.
    async fn fetch_bars(&self, request: &BarRequest) -> Result<BarSet>;
}

/// Market-data REST backend serving fixed candle windows per catalogue pair.
///
/// `TwelveDataClient` in `crates/market` is the production implementation.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// False when the backend is not configured; callers answer 503.
    fn enabled(&self) -> bool;

    /// Pairs this source can serve.
    fn catalog(&self) -> &SymbolCatalog;

    /// Fetch a window covering `hours` of candles for `pair`.
    async fn fetch_series(&self, pair: &str, hours: u64) -> Result<ChartSeries>;
}

/// Outbound messaging channel used for signal alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` and return the provider's delivery confirmation.
    async fn send(&self, text: &str) -> Result<String>;
}
