use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single OHLCV bar as delivered by a chart provider, oldest first in a
/// `BarSet`. Numeric fields are `None` when the provider sent a missing or
/// non-finite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: Option<String>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// Parameters for one chart-provider fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRequest {
    pub symbol: String,
    pub timeframe: String,
    /// Number of bars wanted. Providers may raise this to their own minimum.
    pub range: usize,
    /// Skip the account login and use an anonymous session.
    pub guest: bool,
    /// Fall back to an anonymous session when the login fails.
    pub allow_guest_fallback: bool,
    pub verbose: bool,
}

/// Bars returned by a chart provider plus details about how they were fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSet {
    pub bars: Vec<Bar>,
    pub using_guest: bool,
    pub resolved_symbol: String,
    /// Provider-native resolution code the series was requested with.
    pub timeframe: String,
    pub requested_range: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleMatches {
    /// Bullish candle whose entire range sits above the SMA.
    pub green_above: bool,
    /// Bearish candle whose entire range sits below the SMA.
    pub red_below: bool,
}

impl CandleMatches {
    pub fn verified(&self) -> bool {
        self.green_above || self.red_below
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedCandle {
    /// Position in the full fetched series (0-based).
    pub index: usize,
    pub number: usize,
    pub timestamp: Option<String>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub sma: Option<f64>,
    /// The latest candle, still open at fetch time.
    pub forming: bool,
    pub matches: CandleMatches,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseUsed {
    pub timestamp: Option<String>,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchLists {
    pub green_above: Vec<AnalyzedCandle>,
    pub red_below: Vec<AnalyzedCandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousCompleted {
    pub candle: AnalyzedCandle,
    pub matches: CandleMatches,
    pub forming_reference: Option<AnalyzedCandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMeta {
    pub using_guest: bool,
    pub fetch_range: usize,
}

/// SMA evaluation of the most recent candles of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub symbol: String,
    pub requested_symbol: String,
    pub resolved_symbol: String,
    pub timeframe: String,
    pub normalized_timeframe: String,
    pub total_bars_fetched: usize,
    pub sma_period: usize,
    pub recent_count: usize,
    pub candles: Vec<AnalyzedCandle>,
    /// Closes averaged into the latest candle's SMA.
    pub closes: Vec<CloseUsed>,
    pub sma: Option<f64>,
    pub matches: MatchLists,
    pub previous_completed: Option<PreviousCompleted>,
    pub meta: AnalysisMeta,
}

impl Analysis {
    pub fn forming_candle(&self) -> Option<&AnalyzedCandle> {
        self.candles.last()
    }

    /// True when the last completed candle matched either pattern.
    pub fn triggered(&self) -> bool {
        self.previous_completed
            .as_ref()
            .map(|p| p.matches.verified())
            .unwrap_or(false)
    }
}

/// Candle window fetched from the market-data REST provider, column oriented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub pair: String,
    pub symbol: String,
    pub provider_symbol: String,
    pub interval: String,
    pub resolution: String,
    pub timestamps: Vec<Option<String>>,
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
    pub last_updated: String,
    pub lookback_hours: f64,
    pub fetch_duration_ms: u64,
    pub meta: Option<Value>,
    pub source: String,
    pub requested_output_size: usize,
}

/// Row order requested from the REST provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}
