use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use alerts::AlertDefaults;
use api::{router, AppState, TEST_SUFFIX};
use common::{
    Bar, BarRequest, BarSet, CandleSource, ChartProvider, ChartSeries, Notifier, Result,
    SymbolCatalog,
};
use market::{ChartCache, ChartService};
use strategy::AnalysisOptions;

struct FixedSource {
    enabled: bool,
    catalog: SymbolCatalog,
}

#[async_trait]
impl CandleSource for FixedSource {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn catalog(&self) -> &SymbolCatalog {
        &self.catalog
    }

    async fn fetch_series(&self, pair: &str, hours: u64) -> Result<ChartSeries> {
        Ok(ChartSeries {
            pair: pair.to_string(),
            symbol: pair.to_string(),
            provider_symbol: "XAU/USD".into(),
            interval: "1h".into(),
            resolution: "60".into(),
            timestamps: vec![Some("2024-05-01 10:00:00".into())],
            open: vec![Some(1.0)],
            high: vec![Some(2.0)],
            low: vec![Some(0.5)],
            close: vec![Some(1.5)],
            volume: vec![None],
            last_updated: "2024-05-01T10:00:00.000Z".into(),
            lookback_hours: hours as f64,
            fetch_duration_ms: 3,
            meta: None,
            source: "twelvedata".into(),
            requested_output_size: 1,
        })
    }
}

struct FixedProvider {
    bars: Vec<Bar>,
}

#[async_trait]
impl ChartProvider for FixedProvider {
    async fn fetch_bars(&self, request: &BarRequest) -> Result<BarSet> {
        Ok(BarSet {
            bars: self.bars.clone(),
            using_guest: true,
            resolved_symbol: request.symbol.clone(),
            timeframe: "60".into(),
            requested_range: request.range,
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<String> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok("Message sent".into())
    }
}

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        time: Some(format!("2024-05-01 {i:02}:00:00.000")),
        open: Some(open),
        high: Some(high),
        low: Some(low),
        close: Some(close),
        volume: Some(1.0),
    }
}

/// Flat closes at 100, then a green candle fully above the SMA and a forming one.
fn green_bars() -> Vec<Bar> {
    vec![
        bar(0, 100.0, 100.0, 100.0, 100.0),
        bar(1, 100.0, 100.0, 100.0, 100.0),
        bar(2, 100.0, 100.0, 100.0, 100.0),
        bar(3, 101.0, 104.0, 100.5, 103.0),
        bar(4, 103.0, 103.5, 102.0, 102.5),
    ]
}

fn flat_bars() -> Vec<Bar> {
    (0..5).map(|i| bar(i, 100.0, 100.0, 100.0, 100.0)).collect()
}

struct Harness {
    app: Router,
    notifier: Arc<RecordingNotifier>,
}

fn harness(bars: Vec<Bar>, charts_enabled: bool, with_notifier: bool) -> Harness {
    harness_with_origins(bars, charts_enabled, with_notifier, &["*"])
}

fn harness_with_origins(
    bars: Vec<Bar>,
    charts_enabled: bool,
    with_notifier: bool,
    origins: &[&str],
) -> Harness {
    let source = FixedSource {
        enabled: charts_enabled,
        catalog: SymbolCatalog::default(),
    };
    let charts = ChartService::new(
        Arc::new(source),
        ChartCache::new(std::time::Duration::from_secs(60)),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState {
        charts: Arc::new(charts),
        provider: Arc::new(FixedProvider { bars }),
        notifier: with_notifier.then(|| notifier.clone() as Arc<dyn Notifier>),
        username: "admin".into(),
        password: "secret".into(),
        analysis_defaults: AnalysisOptions {
            symbol: "OANDA:XAUUSD".into(),
            timeframe: "1h".into(),
            range: 120,
            sma_period: 3,
            recent_count: 10,
            guest: false,
            allow_guest_fallback: true,
            verbose: false,
        },
        alert_defaults: AlertDefaults {
            symbol: "OANDA:XAUUSD".into(),
            timeframe: "1h".into(),
            range: 120,
            sma_period: 3,
            recent_count: 10,
        },
    };
    Harness {
        app: router(
            state,
            &origins.iter().map(|o| o.to_string()).collect::<Vec<_>>(),
        ),
        notifier,
    }
}

fn authed(method: Method, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("admin:secret")),
        )
        .body(body)
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let h = harness(green_bars(), true, true);
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn api_rejects_bad_credentials() {
    let h = harness(green_bars(), true, true);
    let request = Request::post("/api/login")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("admin:wrong")),
        )
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        r#"Basic realm="Signal Alert""#
    );

    let request = Request::get("/api/tradingview/signal").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Access denied");
}

#[tokio::test]
async fn login_echoes_username() {
    let h = harness(green_bars(), true, true);
    let (status, body) = send(&h.app, authed(Method::POST, "/api/login", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["username"], "admin");
}

#[tokio::test]
async fn charts_status_codes() {
    let disabled = harness(green_bars(), false, true);
    let (status, body) = send(&disabled.app, authed(Method::GET, "/api/charts", Body::empty())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);

    let h = harness(green_bars(), true, true);
    let (status, body) = send(&h.app, authed(Method::GET, "/api/charts?pair=EURGBP", Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid pair");

    let (status, body) = send(
        &h.app,
        authed(Method::GET, "/api/charts?pair=xauusd&hours=500", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pair"], "XAUUSD");
    assert_eq!(body["data"]["lookbackHours"], 240.0);
}

#[tokio::test]
async fn tradingview_routes_report_matches() {
    let h = harness(green_bars(), true, true);

    let (status, body) = send(
        &h.app,
        authed(Method::GET, "/api/tradingview/candles?symbol=FX:USDJPY&sma=3", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["requestedSymbol"], "FX:USDJPY");
    assert_eq!(data["smaPeriod"], 3);
    assert_eq!(data["totalBarsFetched"], 5);
    assert_eq!(data["candles"].as_array().unwrap().len(), 5);

    let (_, body) = send(&h.app, authed(Method::GET, "/api/tradingview/matches", Body::empty())).await;
    assert_eq!(body["data"]["greenAbove"].as_array().unwrap().len(), 1);
    assert!(body["data"]["redBelow"].as_array().unwrap().is_empty());

    let (_, body) = send(&h.app, authed(Method::GET, "/api/tradingview/signal", Body::empty())).await;
    assert_eq!(body["data"]["triggered"], true);
    assert_eq!(body["data"]["formingCandle"]["forming"], true);
}

#[tokio::test]
async fn whatsapp_dry_run_does_not_send() {
    let h = harness(green_bars(), true, true);
    let (status, body) = send(
        &h.app,
        authed(
            Method::POST,
            "/api/tradingview/whatsapp/test",
            Body::from(r#"{"dryRun":true}"#),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sent"], false);
    assert_eq!(body["data"]["verified"], true);
    assert!(!body["data"]["message"].as_str().unwrap().ends_with(TEST_SUFFIX));
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn whatsapp_sends_with_suffix() {
    let h = harness(green_bars(), true, true);
    let (status, body) = send(
        &h.app,
        authed(Method::POST, "/api/tradingview/whatsapp/test", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sent"], true);
    assert_eq!(body["data"]["delivery"], "Message sent");
    assert_eq!(body["data"]["summary"]["previousTimestamp"], "2024-05-01 03:00:00.000");
    assert_eq!(body["data"]["summary"]["sma"], 100.0);
    assert_eq!(body["data"]["summary"]["matches"]["greenAbove"], true);

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].ends_with(TEST_SUFFIX));
}

#[tokio::test]
async fn whatsapp_unverified_reports_reason() {
    let h = harness(flat_bars(), true, true);
    let (status, body) = send(
        &h.app,
        authed(Method::POST, "/api/tradingview/whatsapp/test", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sent"], false);
    assert_eq!(body["data"]["verified"], false);
    assert_eq!(body["data"]["reason"], "No verified candle detected. Nothing sent.");
    assert!(body["data"]["message"].is_null());
}

#[tokio::test]
async fn whatsapp_without_credentials_fails() {
    let h = harness(green_bars(), true, false);
    let (status, body) = send(
        &h.app,
        authed(Method::POST, "/api/tradingview/whatsapp/test", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "CallMeBot credentials are missing");
}

#[tokio::test]
async fn cors_wildcard_mirrors_origin_with_credentials() {
    let h = harness(green_bars(), true, true);
    let request = Request::get("/health")
        .header(header::ORIGIN, "http://dashboard.test")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://dashboard.test");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn cors_list_allows_only_listed_origins() {
    let h = harness_with_origins(green_bars(), true, true, &["http://allowed.test"]);

    let request = Request::get("/health")
        .header(header::ORIGIN, "http://allowed.test")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://allowed.test"
    );

    let request = Request::get("/health")
        .header(header::ORIGIN, "http://other.test")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn preflight_skips_basic_auth() {
    let h = harness(green_bars(), true, true);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/tradingview/whatsapp/test")
        .header(header::ORIGIN, "http://dashboard.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://dashboard.test"
    );

    // A bare OPTIONS reaches the router but is not challenged.
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/login")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_api_paths_are_gated() {
    let h = harness(green_bars(), true, true);

    let request = Request::get("/api/nope").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access denied");

    let (status, body) = send(&h.app, authed(Method::GET, "/api/nope", Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_paths_serve_the_dashboard() {
    let h = harness(green_bars(), true, true);
    let request = Request::get("/some/route").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("<title>Signal Alert</title>"));

    let request = Request::get("/app.js").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .contains("javascript"));
}
