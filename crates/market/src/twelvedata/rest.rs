use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use common::timeframe::interval_minutes;
use common::{CandleSource, ChartSeries, Error, Result, SymbolCatalog, TwelveDataConfig};

const DEFAULT_HOURS: u64 = 24;

/// REST client for the Twelve Data `time_series` endpoint.
pub struct TwelveDataClient {
    config: TwelveDataConfig,
    catalog: SymbolCatalog,
    http: Client,
}

/// Everything needed to issue and interpret one `time_series` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPlan {
    pub pair: String,
    pub provider_symbol: String,
    pub interval: String,
    pub interval_minutes: u64,
    pub requested_hours: u64,
    pub output_size: usize,
}

impl TwelveDataClient {
    pub fn new(config: TwelveDataConfig, catalog: SymbolCatalog) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            config,
            catalog,
            http,
        })
    }

    /// Validate the pair and work out interval and output size for `hours`.
    pub fn plan(&self, pair: &str, hours: u64) -> Result<SeriesPlan> {
        if !self.config.enabled() {
            return Err(Error::ProviderDisabled);
        }
        let meta = self
            .catalog
            .get(pair)
            .ok_or_else(|| Error::UnsupportedSymbol(pair.to_string()))?;

        let interval = if meta.interval.is_empty() {
            self.config.default_interval.clone()
        } else {
            meta.interval.clone()
        };
        let minutes = interval_minutes(&interval).max(1);
        let requested_hours = if hours > 0 { hours } else { DEFAULT_HOURS };
        let points_needed = requested_hours.saturating_mul(60).div_ceil(minutes).max(1) as usize;

        Ok(SeriesPlan {
            pair: pair.to_string(),
            provider_symbol: meta.provider_symbol.clone(),
            interval,
            interval_minutes: minutes,
            requested_hours,
            output_size: points_needed.min(self.config.max_output_size),
        })
    }

    pub fn time_series_url(&self, plan: &SeriesPlan) -> Result<Url> {
        let base = Url::parse(&format!("{}/", self.config.base_url.trim_end_matches('/')))
            .map_err(|e| Error::Config(format!("TWELVEDATA_BASE_URL: {e}")))?;
        let mut url = base
            .join(self.config.time_series_endpoint.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("TWELVEDATA_TIME_SERIES_ENDPOINT: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("symbol", &plan.provider_symbol)
                .append_pair("interval", &plan.interval)
                .append_pair("outputsize", &plan.output_size.to_string())
                .append_pair("apikey", &self.config.api_key)
                .append_pair("format", "JSON");
            if let Some(tz) = &self.config.timezone {
                query.append_pair("timezone", tz);
            }
            query.append_pair("order", &self.config.order.to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl CandleSource for TwelveDataClient {
    fn enabled(&self) -> bool {
        self.config.enabled()
    }

    fn catalog(&self) -> &SymbolCatalog {
        &self.catalog
    }

    async fn fetch_series(&self, pair: &str, hours: u64) -> Result<ChartSeries> {
        let plan = self.plan(pair, hours)?;
        let url = self.time_series_url(&plan)?;

        debug!(pair = %pair, outputsize = plan.output_size, "Requesting Twelve Data time series");
        let started = Instant::now();
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::provider(
                status.as_u16(),
                format!("Twelve Data responded with {}: {body}", status.as_u16()),
            ));
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let series = build_series(&plan, &body, elapsed_ms)?;

        info!(
            pair = %pair,
            hours = plan.requested_hours,
            latest = %series.last_updated,
            took_ms = series.fetch_duration_ms,
            "Fetched window via Twelve Data"
        );
        Ok(series)
    }
}

// ─── Response parsing ─────────────────────────────────────────────────────────

/// Interpret a `time_series` response body.
///
/// Rows are sorted by datetime (oldest first), truncated to the planned
/// output size, and turned into column vectors.
pub fn build_series(plan: &SeriesPlan, body: &str, fetch_duration_ms: u64) -> Result<ChartSeries> {
    let payload: Value = if body.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(body).map_err(|e| {
            Error::provider(502, format!("Unable to parse Twelve Data response: {e}"))
        })?
    };

    let status = payload.get("status").and_then(Value::as_str).unwrap_or("");
    let message = payload.get("message").and_then(Value::as_str).unwrap_or("");
    let code = payload
        .get("code")
        .and_then(Value::as_u64)
        .filter(|c| *c > 0)
        .map(|c| c as u16);

    if !status.is_empty() && status != "ok" {
        let message = if message.is_empty() {
            "Twelve Data returned an error response"
        } else {
            message
        };
        return Err(Error::provider(code.unwrap_or(502), message));
    }
    if let (Some(code), false, true) = (code, message.is_empty(), status.is_empty()) {
        return Err(Error::provider(code, message));
    }

    let mut rows: Vec<&Value> = payload
        .get("values")
        .and_then(Value::as_array)
        .map(|v| v.iter().collect())
        .unwrap_or_default();
    if rows.is_empty() {
        return Err(Error::provider(404, "Twelve Data returned no candle data"));
    }

    let datetime = |row: &Value| row.get("datetime").and_then(Value::as_str).map(str::to_owned);
    rows.sort_by(|a, b| datetime(*a).cmp(&datetime(*b)));
    let skip = rows.len().saturating_sub(plan.output_size);
    let rows = &rows[skip..];

    let column = |field: &str| -> Vec<Option<f64>> {
        rows.iter().map(|row| lenient_number(row.get(field))).collect()
    };
    let timestamps: Vec<Option<String>> = rows
        .iter()
        .map(|row| row.get("datetime").and_then(Value::as_str).map(str::to_string))
        .collect();

    let interval_hours = plan.interval_minutes as f64 / 60.0;
    let effective_hours = (rows.len() as f64 * interval_hours).max(interval_hours);
    let lookback_hours = (plan.requested_hours as f64).min(effective_hours);

    let last_updated = timestamps
        .last()
        .cloned()
        .flatten()
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    Ok(ChartSeries {
        pair: plan.pair.clone(),
        symbol: plan.provider_symbol.clone(),
        provider_symbol: plan.provider_symbol.clone(),
        interval: plan.interval.clone(),
        resolution: plan.interval.clone(),
        open: column("open"),
        high: column("high"),
        low: column("low"),
        close: column("close"),
        volume: column("volume"),
        timestamps,
        last_updated,
        lookback_hours,
        fetch_duration_ms,
        meta: payload.get("meta").cloned(),
        source: "twelvedata".to_string(),
        requested_output_size: plan.output_size,
    })
}

/// Numbers arrive as strings (`"2345.12"`) or JSON numbers. Non-finite → `None`.
fn lenient_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use common::SortOrder;

    use super::*;

    fn config(api_key: &str) -> TwelveDataConfig {
        TwelveDataConfig {
            api_key: api_key.to_string(),
            base_url: "https://api.twelvedata.com".to_string(),
            time_series_endpoint: "/time_series".to_string(),
            default_interval: "1h".to_string(),
            timezone: None,
            order: SortOrder::Desc,
            max_output_size: 5000,
        }
    }

    fn client(api_key: &str) -> TwelveDataClient {
        TwelveDataClient::new(config(api_key), SymbolCatalog::default()).unwrap()
    }

    fn plan(output_size: usize) -> SeriesPlan {
        SeriesPlan {
            pair: "XAUUSD".into(),
            provider_symbol: "XAU/USD".into(),
            interval: "1h".into(),
            interval_minutes: 60,
            requested_hours: 24,
            output_size,
        }
    }

    #[test]
    fn plan_requires_api_key_and_known_pair() {
        assert!(matches!(client("").plan("XAUUSD", 24), Err(Error::ProviderDisabled)));
        let err = client("k").plan("EURUSD", 24).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn plan_sizes_output_from_hours() {
        let c = client("k");
        let p = c.plan("XAUUSD", 24).unwrap();
        assert_eq!(p.output_size, 24);
        assert_eq!(p.provider_symbol, "XAU/USD");
        assert_eq!(c.plan("XAUUSD", 0).unwrap().requested_hours, 24);

        let mut cfg = config("k");
        cfg.max_output_size = 10;
        let capped = TwelveDataClient::new(cfg, SymbolCatalog::default()).unwrap();
        assert_eq!(capped.plan("US30", 240).unwrap().output_size, 10);
    }

    #[test]
    fn huge_lookback_is_capped_not_overflowed() {
        let p = client("k").plan("XAUUSD", u64::MAX).unwrap();
        assert_eq!(p.requested_hours, u64::MAX);
        assert_eq!(p.output_size, 5000);
    }

    #[test]
    fn url_carries_all_query_parameters() {
        let c = client("secret");
        let url = c.time_series_url(&c.plan("USDJPY", 48).unwrap()).unwrap();
        assert_eq!(url.path(), "/time_series");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("symbol".into(), "USD/JPY".into())));
        assert!(query.contains(&("outputsize".into(), "48".into())));
        assert!(query.contains(&("apikey".into(), "secret".into())));
        assert!(query.contains(&("format".into(), "JSON".into())));
        assert!(query.contains(&("order".into(), "desc".into())));
        assert!(!query.iter().any(|(k, _)| k == "timezone"));
    }

    #[test]
    fn rows_are_sorted_truncated_and_parsed() {
        let body = r#"{
            "meta": {"symbol": "XAU/USD"},
            "status": "ok",
            "values": [
                {"datetime": "2024-05-01 12:00:00", "open": "3", "high": "4", "low": "2", "close": "3.5", "volume": "x"},
                {"datetime": "2024-05-01 10:00:00", "open": "1", "high": "2", "low": "0.5", "close": "1.5"},
                {"datetime": "2024-05-01 11:00:00", "open": 2, "high": 3, "low": 1, "close": 2.5}
            ]
        }"#;
        let series = build_series(&plan(2), body, 12).unwrap();
        assert_eq!(
            series.timestamps,
            vec![
                Some("2024-05-01 11:00:00".to_string()),
                Some("2024-05-01 12:00:00".to_string())
            ]
        );
        assert_eq!(series.open, vec![Some(2.0), Some(3.0)]);
        assert_eq!(series.volume, vec![None, None]);
        assert_eq!(series.last_updated, "2024-05-01 12:00:00");
        assert_eq!(series.lookback_hours, 2.0);
        assert_eq!(series.requested_output_size, 2);
        assert_eq!(series.source, "twelvedata");
        assert_eq!(series.meta.unwrap()["symbol"], "XAU/USD");
    }

    #[test]
    fn error_payloads_keep_provider_code() {
        let err = build_series(
            &plan(10),
            r#"{"code": 429, "message": "out of credits", "status": "error"}"#,
            0,
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.to_string(), "out of credits");

        let err = build_series(&plan(10), r#"{"status": "error"}"#, 0).unwrap_err();
        assert_eq!(err.status_code(), 502);

        let err = build_series(&plan(10), r#"{"code": 401, "message": "bad key"}"#, 0).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn empty_and_garbage_bodies() {
        let err = build_series(&plan(10), "", 0).unwrap_err();
        assert_eq!(err.status_code(), 404);
        let err = build_series(&plan(10), r#"{"values": []}"#, 0).unwrap_err();
        assert_eq!(err.to_string(), "Twelve Data returned no candle data");
        let err = build_series(&plan(10), "<html>", 0).unwrap_err();
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(lenient_number(Some(&Value::from("1.25"))), Some(1.25));
        assert_eq!(lenient_number(Some(&Value::from(2))), Some(2.0));
        assert_eq!(lenient_number(Some(&Value::from("NaN"))), None);
        assert_eq!(lenient_number(Some(&Value::Null)), None);
        assert_eq!(lenient_number(None), None);
    }
}
