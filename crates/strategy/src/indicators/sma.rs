/// Trailing SMA (Simple Moving Average) indicator.
///
/// The value attached to a candle is the mean close of the `period` candles
/// before it; the candle itself is not part of its own average. This lets a
/// finished candle be judged against the average it opened into.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Compute the SMA for every position of `closes` (oldest first).
    ///
    /// Position `i` is `None` while `i < period`, when any close in the
    /// window is missing or non-finite, or when `period` is zero.
    pub fn series(&self, closes: &[Option<f64>]) -> Vec<Option<f64>> {
        if self.period == 0 {
            return vec![None; closes.len()];
        }

        (0..closes.len())
            .map(|i| {
                if i < self.period {
                    return None;
                }
                let window = &closes[i - self.period..i];
                let mut sum = 0.0;
                for close in window {
                    match close {
                        Some(v) if v.is_finite() => sum += v,
                        _ => return None,
                    }
                }
                Some(sum / self.period as f64)
            })
            .collect()
    }
}
