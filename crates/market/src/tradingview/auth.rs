use reqwest::header::{HeaderMap, COOKIE, ORIGIN, REFERER, SET_COOKIE};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Error, Result};

pub(crate) const TRADINGVIEW_ORIGIN: &str = "https://www.tradingview.com";
const SIGNIN_URL: &str = "https://www.tradingview.com/accounts/signin/";
const CHART_TOKEN_URL: &str = "https://www.tradingview.com/chart-token/";

/// Credentials of a logged-in TradingView account.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub user_id: i64,
    pub username: String,
    /// Sent with `set_auth_token` on the chart websocket.
    pub auth_token: String,
    /// `sessionid` cookie.
    pub session: String,
    /// `sessionid_sign` cookie.
    pub signature: String,
}

impl AuthSession {
    fn cookie_header(&self) -> String {
        format!("sessionid={};sessionid_sign={}", self.session, self.signature)
    }
}

/// Sign in with username and password.
pub async fn login(http: &Client, username: &str, password: &str) -> Result<AuthSession> {
    if username.is_empty() || password.is_empty() {
        return Err(Error::Other("Missing TradingView credentials".to_string()));
    }

    let resp = http
        .post(SIGNIN_URL)
        .header(ORIGIN, TRADINGVIEW_ORIGIN)
        .header(REFERER, TRADINGVIEW_ORIGIN)
        .form(&[
            ("username", username),
            ("password", password),
            ("remember", "on"),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let session = cookie_value(resp.headers(), "sessionid").unwrap_or_default();
    let signature = cookie_value(resp.headers(), "sessionid_sign").unwrap_or_default();
    let body: Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;

    let auth = parse_login(&body, session, signature)?;
    debug!(user_id = auth.user_id, username = %auth.username, "TradingView login succeeded");
    Ok(auth)
}

/// Interpret the sign-in response body.
pub fn parse_login(body: &Value, session: String, signature: String) -> Result<AuthSession> {
    if let Some(error) = body
        .get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
    {
        return Err(Error::Other(error.to_string()));
    }

    let user = body
        .get("user")
        .ok_or_else(|| Error::Other("Unexpected TradingView login response".to_string()))?;

    Ok(AuthSession {
        user_id: user.get("id").and_then(Value::as_i64).unwrap_or_default(),
        username: user
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        auth_token: user
            .get("auth_token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        session,
        signature,
    })
}

/// Check that the account can open the saved chart layout `layout_id`.
/// Returns the layout's chart token.
pub async fn verify_layout(http: &Client, layout_id: &str, auth: &AuthSession) -> Result<String> {
    let resp = http
        .get(CHART_TOKEN_URL)
        .query(&[
            ("image_url", layout_id.to_string()),
            ("user_id", auth.user_id.to_string()),
        ])
        .header(COOKIE, auth.cookie_header())
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let body: Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
    body.get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Other("Wrong layout or credentials".to_string()))
}

/// Value of cookie `name` among the response's `Set-Cookie` headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next()?.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
