use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use common::ChartSeries;

struct CachedSeries {
    series: ChartSeries,
    cached_at: Instant,
}

/// Latest fetched window per pair. One entry per pair; a newer fetch replaces it.
pub struct ChartCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedSeries>>,
}

impl ChartCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached window for `pair` if it is younger than the TTL and covers at
    /// least `hours` of history.
    pub async fn get(&self, pair: &str, hours: u64) -> Option<ChartSeries> {
        let entries = self.entries.read().await;
        let cached = entries.get(pair)?;
        let fresh = cached.cached_at.elapsed() < self.ttl;
        let covers = cached.series.lookback_hours >= hours as f64;
        (fresh && covers).then(|| cached.series.clone())
    }

    pub async fn insert(&self, pair: &str, series: ChartSeries) {
        self.entries.write().await.insert(
            pair.to_string(),
            CachedSeries {
                series,
                cached_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
