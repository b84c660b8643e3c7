use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use tracing::warn;

use crate::AppState;

const REALM: &str = r#"Basic realm="Signal Alert""#;

/// Username that passed Basic authentication, available to handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Middleware enforcing HTTP Basic credentials on every protected route.
/// Preflight `OPTIONS` requests pass through.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic);

    match credentials {
        Some((user, pass)) if user == state.username && pass == state.password => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        }
        _ => {
            warn!(path = %request.uri().path(), "Rejected request with bad credentials");
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, REALM)],
                Json(json!({ "success": false, "error": "Access denied" })),
            )
                .into_response()
        }
    }
}

/// Decode `Basic base64(user:pass)`.
pub fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}
