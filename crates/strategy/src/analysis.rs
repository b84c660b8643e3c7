use tracing::debug;

use common::{
    Analysis, AnalysisMeta, AnalyzedCandle, BarRequest, BarSet, ChartProvider, CloseUsed, Error,
    MatchLists, PreviousCompleted, Result, TradingViewConfig,
};

use crate::indicators::SmaIndicator;
use crate::matches::evaluate_matches;

/// What to fetch and how to evaluate it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub symbol: String,
    pub timeframe: String,
    /// Bars requested from the chart provider.
    pub range: usize,
    pub sma_period: usize,
    /// Number of trailing candles reported (the forming one included).
    pub recent_count: usize,
    pub guest: bool,
    pub allow_guest_fallback: bool,
    pub verbose: bool,
}

impl AnalysisOptions {
    /// Defaults taken from the chart-provider configuration.
    pub fn from_config(cfg: &TradingViewConfig) -> Self {
        Self {
            symbol: cfg.default_symbol.clone(),
            timeframe: cfg.default_interval.clone(),
            range: cfg.fetch_range,
            sma_period: cfg.sma_length,
            recent_count: cfg.recent_count,
            guest: false,
            allow_guest_fallback: true,
            verbose: false,
        }
    }

    pub fn bar_request(&self) -> BarRequest {
        BarRequest {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            range: self.range,
            guest: self.guest,
            allow_guest_fallback: self.allow_guest_fallback,
            verbose: self.verbose,
        }
    }
}

/// Fetch bars from `provider` and evaluate them.
pub async fn fetch_analysis(
    provider: &dyn ChartProvider,
    options: &AnalysisOptions,
) -> Result<Analysis> {
    let bar_set = provider.fetch_bars(&options.bar_request()).await?;
    analyze(options, bar_set)
}

/// Attach the trailing SMA to every bar and classify the most recent candles.
pub fn analyze(options: &AnalysisOptions, bar_set: BarSet) -> Result<Analysis> {
    let BarSet {
        bars,
        using_guest,
        resolved_symbol,
        timeframe: normalized_timeframe,
        ..
    } = bar_set;

    if bars.is_empty() {
        return Err(Error::Other("No bars returned from TradingView".to_string()));
    }

    let closes: Vec<Option<f64>> = bars.iter().map(|b| b.close).collect();
    let sma = SmaIndicator::new(options.sma_period).series(&closes);

    let candles: Vec<AnalyzedCandle> = bars
        .into_iter()
        .zip(sma)
        .enumerate()
        .map(|(index, (bar, sma))| AnalyzedCandle {
            index,
            number: index + 1,
            timestamp: bar.time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            sma,
            forming: false,
            matches: Default::default(),
        })
        .collect();

    let total = candles.len();
    let keep = options.recent_count.max(1).min(total);
    let latest_sma = candles[total - 1].sma;

    // The latest SMA averages the `sma_period` closes right before it.
    let closes_used: Vec<CloseUsed> = match latest_sma {
        Some(_) => candles[total - 1 - options.sma_period..total - 1]
            .iter()
            .map(|c| CloseUsed {
                timestamp: c.timestamp.clone(),
                close: c.close,
            })
            .collect(),
        None => Vec::new(),
    };

    let recent: Vec<AnalyzedCandle> = candles[total - keep..]
        .iter()
        .cloned()
        .map(|mut candle| {
            candle.forming = candle.index == total - 1;
            candle.matches =
                evaluate_matches(candle.open, candle.high, candle.low, candle.close, candle.sma);
            candle
        })
        .collect();

    let matches = MatchLists {
        green_above: recent
            .iter()
            .filter(|c| c.matches.green_above)
            .cloned()
            .collect(),
        red_below: recent
            .iter()
            .filter(|c| c.matches.red_below)
            .cloned()
            .collect(),
    };

    let previous_completed = (recent.len() >= 2).then(|| {
        let candle = recent[recent.len() - 2].clone();
        PreviousCompleted {
            matches: candle.matches,
            candle,
            forming_reference: recent.last().cloned(),
        }
    });

    debug!(
        symbol = %options.symbol,
        bars = total,
        green_above = matches.green_above.len(),
        red_below = matches.red_below.len(),
        "Analysis complete"
    );

    Ok(Analysis {
        symbol: options.symbol.clone(),
        requested_symbol: options.symbol.clone(),
        resolved_symbol,
        timeframe: options.timeframe.clone(),
        normalized_timeframe,
        total_bars_fetched: total,
        sma_period: options.sma_period,
        recent_count: recent.len(),
        candles: recent,
        closes: closes_used,
        sma: latest_sma,
        matches,
        previous_completed,
        meta: AnalysisMeta {
            using_guest,
            fetch_range: options.range,
        },
    })
}
