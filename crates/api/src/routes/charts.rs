use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use common::timeframe::leading_int;

use crate::{ApiError, AppState};

const DEFAULT_PAIR: &str = "XAUUSD";

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub pair: Option<String>,
    pub hours: Option<String>,
}

/// `GET /api/charts?pair=XAUUSD&hours=24`: cached Twelve Data candles.
pub async fn get_charts(
    State(state): State<AppState>,
    Query(q): Query<ChartQuery>,
) -> Result<Json<Value>, ApiError> {
    let pair = q
        .pair
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PAIR)
        .to_uppercase();
    let hours = q.hours.as_deref().and_then(leading_int);

    if !state.charts.enabled() {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Twelve Data integration is disabled",
        ));
    }
    if state.charts.catalog().get(&pair).is_none() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid pair"));
    }

    let data = state
        .charts
        .get_candles(&pair, hours)
        .await
        .map_err(|e| ApiError::logged("chart fetch", e))?;
    Ok(Json(json!({ "success": true, "data": data })))
}
