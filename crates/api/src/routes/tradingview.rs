use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use common::config::{parse_bool_flag, parse_positive_int};
use common::Analysis;
use strategy::{fetch_analysis, AnalysisOptions};

use crate::{ApiError, AppState};

/// Query string shared by the TradingView analysis routes. Values are parsed
/// leniently; anything unusable falls back to the configured default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisQuery {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub range: Option<String>,
    pub sma: Option<String>,
    pub sma_period: Option<String>,
    pub count: Option<String>,
    pub limit: Option<String>,
    pub guest: Option<String>,
    pub no_fallback: Option<String>,
    pub verbose: Option<String>,
}

impl AnalysisQuery {
    pub fn options(&self, defaults: &AnalysisOptions) -> AnalysisOptions {
        let text = |v: &Option<String>, fallback: &str| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        let positive = |v: Option<&String>, fallback: usize| {
            parse_positive_int(v.map(String::as_str), fallback as u64) as usize
        };
        let flag = |v: &Option<String>| parse_bool_flag(v.as_deref(), false);

        AnalysisOptions {
            symbol: text(&self.symbol, &defaults.symbol),
            timeframe: text(&self.timeframe, &defaults.timeframe),
            range: positive(self.range.as_ref(), defaults.range),
            sma_period: positive(self.sma.as_ref().or(self.sma_period.as_ref()), defaults.sma_period),
            recent_count: positive(self.count.as_ref().or(self.limit.as_ref()), defaults.recent_count),
            guest: flag(&self.guest),
            allow_guest_fallback: !flag(&self.no_fallback),
            verbose: flag(&self.verbose),
        }
    }
}

async fn analyze(state: &AppState, q: &AnalysisQuery, context: &'static str) -> Result<Analysis, ApiError> {
    let options = q.options(&state.analysis_defaults);
    fetch_analysis(state.provider.as_ref(), &options)
        .await
        .map_err(|e| ApiError::logged(context, e))
}

/// `GET /api/tradingview/candles`: recent candles with SMA and matches.
pub async fn get_candles(
    State(state): State<AppState>,
    Query(q): Query<AnalysisQuery>,
) -> Result<Json<Value>, ApiError> {
    let a = analyze(&state, &q, "TradingView candles").await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "requestedSymbol": a.requested_symbol,
            "symbol": a.symbol,
            "timeframe": a.timeframe,
            "smaPeriod": a.sma_period,
            "recentCount": a.recent_count,
            "totalBarsFetched": a.total_bars_fetched,
            "candles": a.candles,
            "closes": a.closes,
            "sma": a.sma,
            "matches": a.matches,
            "meta": a.meta,
        },
    })))
}

/// `GET /api/tradingview/matches`: only the matching candles.
pub async fn get_matches(
    State(state): State<AppState>,
    Query(q): Query<AnalysisQuery>,
) -> Result<Json<Value>, ApiError> {
    let a = analyze(&state, &q, "TradingView matches").await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "requestedSymbol": a.requested_symbol,
            "symbol": a.symbol,
            "timeframe": a.timeframe,
            "smaPeriod": a.sma_period,
            "recentCount": a.recent_count,
            "greenAbove": a.matches.green_above,
            "redBelow": a.matches.red_below,
            "totalBarsFetched": a.total_bars_fetched,
            "meta": a.meta,
        },
    })))
}

/// `GET /api/tradingview/signal`: previous completed candle, forming candle
/// and whether the previous one triggered.
pub async fn get_signal(
    State(state): State<AppState>,
    Query(q): Query<AnalysisQuery>,
) -> Result<Json<Value>, ApiError> {
    let a = analyze(&state, &q, "TradingView signal").await?;
    let triggered = a.previous_completed.as_ref().map(|p| p.matches.verified());
    Ok(Json(json!({
        "success": true,
        "data": {
            "requestedSymbol": a.requested_symbol,
            "symbol": a.symbol,
            "timeframe": a.timeframe,
            "smaPeriod": a.sma_period,
            "totalBarsFetched": a.total_bars_fetched,
            "previousCompleted": a.previous_completed,
            "formingCandle": a.forming_candle(),
            "triggered": triggered,
            "meta": a.meta,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AnalysisOptions {
        AnalysisOptions {
            symbol: "OANDA:XAUUSD".into(),
            timeframe: "1h".into(),
            range: 120,
            sma_period: 9,
            recent_count: 10,
            guest: false,
            allow_guest_fallback: true,
            verbose: false,
        }
    }

    #[test]
    fn empty_query_uses_defaults() {
        assert_eq!(AnalysisQuery::default().options(&defaults()), defaults());
    }

    #[test]
    fn aliases_and_flags() {
        let q = AnalysisQuery {
            symbol: Some(" FX:USDJPY ".into()),
            sma_period: Some("21".into()),
            limit: Some("5".into()),
            range: Some("-4".into()),
            guest: Some("yes".into()),
            no_fallback: Some("1".into()),
            ..Default::default()
        };
        let o = q.options(&defaults());
        assert_eq!(o.symbol, "FX:USDJPY");
        assert_eq!(o.sma_period, 21);
        assert_eq!(o.recent_count, 5);
        assert_eq!(o.range, 120);
        assert!(o.guest);
        assert!(!o.allow_guest_fallback);
    }

    #[test]
    fn primary_names_win_over_aliases() {
        let q = AnalysisQuery {
            sma: Some("3".into()),
            sma_period: Some("21".into()),
            count: Some("7".into()),
            limit: Some("5".into()),
            ..Default::default()
        };
        let o = q.options(&defaults());
        assert_eq!(o.sma_period, 3);
        assert_eq!(o.recent_count, 7);
    }
}
