use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::charts::ChartService;

/// Periodically refreshes the chart cache for every configured pair.
pub struct OhlcPoller {
    service: Arc<ChartService>,
    lookback_hours: u64,
    every: Duration,
}

impl OhlcPoller {
    pub fn new(service: Arc<ChartService>, lookback_hours: u64, every: Duration) -> Self {
        Self {
            service,
            lookback_hours,
            every,
        }
    }

    /// Refresh each pair in turn. Returns how many pairs failed.
    pub async fn poll_once(&self) -> usize {
        let mut failures = 0;
        for pair in self.service.catalog().pairs() {
            if let Err(e) = self.service.refresh(&pair, self.lookback_hours).await {
                warn!(pair = %pair, error = %e, "Error polling pair");
                failures += 1;
            }
        }
        failures
    }

    /// Poll immediately, then on every tick. Call inside a `tokio::spawn`.
    pub async fn run(self) {
        if !self.service.enabled() {
            info!("Twelve Data polling disabled (no API key configured)");
            return;
        }

        info!(
            pairs = self.service.catalog().len(),
            lookback_hours = self.lookback_hours,
            every = ?self.every,
            "Starting OHLC poller"
        );

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::cache::ChartCache;
    use crate::charts::tests::CountingSource;

    #[tokio::test]
    async fn poll_once_refreshes_every_pair() {
        let source = Arc::new(CountingSource::new());
        let service = Arc::new(ChartService::new(
            source.clone(),
            ChartCache::new(Duration::from_secs(60)),
        ));
        let poller = OhlcPoller::new(service.clone(), 24, Duration::from_secs(300));

        assert_eq!(poller.poll_once().await, 0);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        // Everything polled is now served from cache.
        service.get_candles("USDJPY", Some(24)).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }
}
