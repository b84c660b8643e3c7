use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::info;

use alerts::{prepare_alert, AlertOverrides, PreparedAlert};
use common::config::{parse_bool_flag, parse_positive_int};
use common::Error;

use crate::{ApiError, AppState};

/// Appended to manually triggered messages.
pub const TEST_SUFFIX: &str = " Just a quick test ping so you know I'm awake.";

/// Parameters of a manual alert. Body fields win over query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TestAlertRequest {
    pub overrides: AlertOverrides,
    pub dry_run: bool,
    pub send: bool,
}

impl TestAlertRequest {
    /// Build from a (possibly empty or invalid) JSON body and the query string.
    pub fn parse(body: &[u8], query: &HashMap<String, String>) -> Self {
        let body = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        let lookup = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| body_text(&body, k))
                .or_else(|| keys.iter().find_map(|k| query.get(*k).cloned()))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let positive = |keys: &[&str]| {
            lookup(keys)
                .map(|v| parse_positive_int(Some(v.as_str()), 0) as usize)
                .filter(|v| *v > 0)
        };

        Self {
            overrides: AlertOverrides {
                symbol: lookup(&["symbol"]),
                timeframe: lookup(&["timeframe"]),
                range: None,
                sma_period: positive(&["sma", "smaPeriod"]),
                recent_count: positive(&["recentCount", "count"]),
                guest: false,
                no_fallback: false,
            },
            dry_run: parse_bool_flag(lookup(&["dryRun"]).as_deref(), false),
            send: parse_bool_flag(lookup(&["send"]).as_deref(), true),
        }
    }

    fn delivers(&self) -> bool {
        self.send && !self.dry_run
    }
}

fn body_text(body: &Map<String, Value>, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn summary(prepared: &PreparedAlert) -> Value {
    let matches = prepared
        .previous
        .as_ref()
        .map(|c| json!(c.matches))
        .unwrap_or_else(|| json!({}));
    json!({
        "symbol": prepared.analysis.symbol,
        "timeframe": prepared.analysis.timeframe,
        "previousTimestamp": prepared.previous_timestamp(),
        "matches": matches,
        "sma": prepared.previous.as_ref().and_then(|c| c.sma),
    })
}

/// `POST /api/tradingview/whatsapp/test`: prepare an alert for one symbol and
/// optionally deliver it.
pub async fn post_test_alert(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request = TestAlertRequest::parse(&body, &query);
    let prepared = prepare_alert(state.provider.as_ref(), &state.alert_defaults, &request.overrides)
        .await
        .map_err(|e| ApiError::logged("WhatsApp test alert", e))?;

    if !prepared.verified || prepared.message.is_empty() {
        return Ok(Json(json!({
            "success": true,
            "data": {
                "sent": false,
                "dryRun": request.dry_run,
                "verified": false,
                "reason": "No verified candle detected. Nothing sent.",
                "message": null,
                "delivery": null,
                "summary": summary(&prepared),
            },
        })));
    }

    let mut delivery = None;
    let mut message = prepared.message.clone();
    if request.delivers() {
        let notifier = state.notifier.as_ref().ok_or_else(|| {
            ApiError::logged(
                "WhatsApp test alert",
                Error::Notify("CallMeBot credentials are missing".to_string()),
            )
        })?;
        message.push_str(TEST_SUFFIX);
        let confirmation = notifier
            .send(&message)
            .await
            .map_err(|e| ApiError::logged("WhatsApp test alert", e))?;
        info!(symbol = %prepared.analysis.symbol, "Sent WhatsApp test alert");
        delivery = Some(confirmation);
    }

    Ok(Json(json!({
        "success": true,
        "data": {
            "sent": delivery.is_some(),
            "dryRun": request.dry_run,
            "verified": true,
            "message": message,
            "delivery": delivery,
            "summary": summary(&prepared),
        },
    })))
}
