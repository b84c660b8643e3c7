mod auth;
mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use alerts::AlertDefaults;
use common::{ChartProvider, Notifier, Result};
use market::ChartService;
use strategy::AnalysisOptions;

pub use error::ApiError;
pub use routes::{AnalysisQuery, TestAlertRequest, TEST_SUFFIX};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Twelve Data candles behind the chart cache.
    pub charts: Arc<ChartService>,
    /// TradingView bars for the SMA analysis routes.
    pub provider: Arc<dyn ChartProvider>,
    /// `None` when no CallMeBot credentials are configured.
    pub notifier: Option<Arc<dyn Notifier>>,
    pub username: String,
    pub password: String,
    pub analysis_defaults: AnalysisOptions,
    pub alert_defaults: AlertDefaults,
}

/// Assemble every route with CORS applied.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .merge(routes::static_router())
        .with_state(state)
        .layer(cors_layer(cors_origins))
}

/// `*` anywhere in the list mirrors the caller's origin; otherwise only the
/// listed origins are allowed. Credentials are allowed in both cases.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::mirror_request());
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Bind `0.0.0.0:port` and serve until Ctrl-C or SIGTERM.
pub async fn serve(state: AppState, port: u16, cors_origins: &[String]) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state, cors_origins);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Signal alert backend listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server closed gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Interrupt received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
