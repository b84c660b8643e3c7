use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::auth::{require_auth, AuthenticatedUser};
use crate::{ApiError, AppState};

use super::{charts, tradingview, whatsapp};

/// Everything under `/api`, unknown paths included, sits behind Basic
/// authentication.
pub fn api_router(state: AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/login", post(login))
        .route("/charts", get(charts::get_charts))
        .route("/tradingview/candles", get(tradingview::get_candles))
        .route("/tradingview/matches", get(tradingview::get_matches))
        .route("/tradingview/signal", get(tradingview::get_signal))
        .route("/tradingview/whatsapp/test", post(whatsapp::post_test_alert))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state, require_auth));
    Router::new().nest("/api", routes)
}

async fn login(Extension(AuthenticatedUser(username)): Extension<AuthenticatedUser>) -> Json<Value> {
    Json(json!({
        "success": true,
        "user": { "username": username },
    }))
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}
