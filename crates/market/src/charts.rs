use std::sync::Arc;

use tracing::{debug, info};

use common::{CandleSource, ChartSeries, Result, SymbolCatalog};

use crate::cache::ChartCache;

/// Largest window served to the dashboard, in hours.
pub const MAX_LOOKBACK_HOURS: u64 = 240;
pub const DEFAULT_LOOKBACK_HOURS: u64 = 24;

/// Cache-fronted access to the REST candle source.
pub struct ChartService {
    source: Arc<dyn CandleSource>,
    cache: ChartCache,
}

impl ChartService {
    pub fn new(source: Arc<dyn CandleSource>, cache: ChartCache) -> Self {
        Self { source, cache }
    }

    pub fn enabled(&self) -> bool {
        self.source.enabled()
    }

    pub fn catalog(&self) -> &SymbolCatalog {
        self.source.catalog()
    }

    /// Serve `hours` of candles for `pair`, from cache when possible.
    pub async fn get_candles(&self, pair: &str, hours: Option<i64>) -> Result<ChartSeries> {
        let hours = normalize_hours(hours);
        if let Some(series) = self.cache.get(pair, hours).await {
            debug!(pair = %pair, hours, "Chart cache hit");
            return Ok(series);
        }
        self.refresh(pair, hours).await
    }

    /// Fetch from the source unconditionally and store the result.
    pub async fn refresh(&self, pair: &str, hours: u64) -> Result<ChartSeries> {
        let series = self.source.fetch_series(pair, hours).await?;
        info!(
            pair = %pair,
            hours,
            latest = %series.last_updated,
            took_ms = series.fetch_duration_ms,
            source = %series.source,
            "Fetched chart window"
        );
        self.cache.insert(pair, series.clone()).await;
        Ok(series)
    }
}

/// Clamp a requested window to `1..=240` hours; missing or non-positive → 24.
pub fn normalize_hours(hours: Option<i64>) -> u64 {
    match hours {
        Some(h) if h > 0 => (h as u64).min(MAX_LOOKBACK_HOURS),
        _ => DEFAULT_LOOKBACK_HOURS,
    }
}
