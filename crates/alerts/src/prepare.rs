use serde::Serialize;

use common::{AlertConfig, Analysis, AnalyzedCandle, ChartProvider, Error, Result, TradingViewConfig};
use strategy::{fetch_analysis, AnalysisOptions};

use crate::message::build_alert_message;

/// Smallest candle window evaluated for alerts.
const MIN_ALERT_RECENT_COUNT: usize = 10;

/// Analysis parameters used when an alert request does not override them.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDefaults {
    pub symbol: String,
    pub timeframe: String,
    pub range: usize,
    pub sma_period: usize,
    pub recent_count: usize,
}

impl AlertDefaults {
    pub fn from_config(tv: &TradingViewConfig, alerts: &AlertConfig) -> Self {
        Self {
            symbol: alerts
                .symbols
                .first()
                .cloned()
                .unwrap_or_else(|| tv.default_symbol.clone()),
            timeframe: alerts.timeframe.clone(),
            range: tv.fetch_range,
            sma_period: tv.sma_length,
            recent_count: tv.recent_count.max(MIN_ALERT_RECENT_COUNT),
        }
    }
}

/// Per-request overrides. `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertOverrides {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub range: Option<usize>,
    pub sma_period: Option<usize>,
    pub recent_count: Option<usize>,
    pub guest: bool,
    pub no_fallback: bool,
}

impl AlertOverrides {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }
}

/// Result of evaluating one symbol for an alert.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedAlert {
    pub analysis: Analysis,
    /// Empty unless `verified`.
    pub message: String,
    pub forming: Option<AnalyzedCandle>,
    pub previous: Option<AnalyzedCandle>,
    pub verified: bool,
}

impl PreparedAlert {
    pub fn previous_timestamp(&self) -> Option<&str> {
        self.previous.as_ref().and_then(|c| c.timestamp.as_deref())
    }
}

/// Run the analysis for an alert and build its message.
pub async fn prepare_alert(
    provider: &dyn ChartProvider,
    defaults: &AlertDefaults,
    overrides: &AlertOverrides,
) -> Result<PreparedAlert> {
    let symbol = overrides
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(defaults.symbol.as_str());
    if symbol.is_empty() {
        return Err(Error::Other(
            "No symbol provided for WhatsApp alert".to_string(),
        ));
    }

    let options = AnalysisOptions {
        symbol: symbol.to_string(),
        timeframe: overrides
            .timeframe
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| defaults.timeframe.clone()),
        range: overrides.range.filter(|r| *r > 0).unwrap_or(defaults.range),
        sma_period: overrides
            .sma_period
            .filter(|p| *p > 0)
            .unwrap_or(defaults.sma_period),
        recent_count: overrides
            .recent_count
            .filter(|c| *c > 0)
            .unwrap_or(defaults.recent_count),
        guest: overrides.guest,
        allow_guest_fallback: !overrides.no_fallback,
        verbose: false,
    };

    let analysis = fetch_analysis(provider, &options).await?;
    let forming = analysis.forming_candle().cloned();
    let previous = analysis
        .previous_completed
        .as_ref()
        .map(|p| AnalyzedCandle {
            matches: p.matches,
            ..p.candle.clone()
        });
    let verified = previous.as_ref().is_some_and(|c| c.matches.verified());
    let message = if verified {
        build_alert_message(
            &analysis.symbol,
            &analysis.timeframe,
            previous.as_ref(),
            forming.as_ref(),
        )
    } else {
        String::new()
    };

    Ok(PreparedAlert {
        analysis,
        message,
        forming,
        previous,
        verified,
    })
}
