use std::time::Duration;

/// Shortest gap between two regular alert rounds.
pub const MIN_BASE_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Shortest retry step after a failed round.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Linear back-off between alert rounds.
///
/// A failed round schedules the next one after `retry * failures`. Once
/// failures exceed `max_retries` the counter resets and the regular base
/// interval applies again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base: Duration,
    retry: Duration,
    max_retries: u32,
    failures: u32,
}

impl RetryPolicy {
    pub fn new(poll_interval: Duration, retry_interval: Duration, max_retries: u32) -> Self {
        Self {
            base: poll_interval.max(MIN_BASE_INTERVAL),
            retry: retry_interval.max(MIN_RETRY_INTERVAL),
            max_retries: max_retries.max(1),
            failures: 0,
        }
    }

    pub fn base_interval(&self) -> Duration {
        self.base
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Consecutive failed rounds so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record the outcome of a round and return the delay before the next.
    pub fn next_delay(&mut self, had_errors: bool) -> Duration {
        if !had_errors {
            self.failures = 0;
            return self.base;
        }

        self.failures += 1;
        if self.failures > self.max_retries {
            self.failures = 0;
            return self.base;
        }
        self.retry * self.failures
    }
}
