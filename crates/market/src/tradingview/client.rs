use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use common::timeframe::normalize_chart_timeframe;
use common::{BarRequest, BarSet, ChartProvider, Error, Result, TradingViewConfig};

use super::auth::{self, AuthSession};
use super::search;
use super::session::{ChartSession, SeriesSpec, SessionOptions, MIN_RANGE};

/// Chart provider backed by the TradingView chart websocket.
pub struct TradingViewClient {
    config: TradingViewConfig,
    http: Client,
}

impl TradingViewClient {
    pub fn new(config: TradingViewConfig) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// Log in unless a guest session was asked for. Returns `None` for guest
    /// sessions, including the fallback after a failed login.
    async fn authenticate(&self, request: &BarRequest) -> Result<Option<AuthSession>> {
        if request.guest {
            return Ok(None);
        }

        match auth::login(&self.http, &self.config.username, &self.config.password).await {
            Ok(session) => {
                if request.verbose {
                    info!(
                        username = %session.username,
                        user_id = session.user_id,
                        "Authenticated TradingView user"
                    );
                }
                Ok(Some(session))
            }
            Err(e) if request.allow_guest_fallback => {
                warn!(error = %e, "TradingView login failed, falling back to guest mode");
                Ok(None)
            }
            Err(e) => Err(Error::Other(format!("TradingView login failed: {e}"))),
        }
    }

    async fn check_layout(&self, session: &AuthSession, verbose: bool) {
        let Some(layout_id) = self.config.layout_id.as_deref() else {
            if verbose {
                warn!("TRADINGVIEW_LAYOUT_ID is not set; continuing without layout verification");
            }
            return;
        };

        match auth::verify_layout(&self.http, layout_id, session).await {
            Ok(_) if verbose => info!(layout_id = %layout_id, "Verified access to layout"),
            Ok(_) => {}
            Err(e) if verbose => {
                warn!(error = %e, "Layout verification failed, continuing without layout token")
            }
            Err(_) => {}
        }
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            login_timeout: self.config.login_timeout,
            data_timeout: self.config.data_timeout,
            debug: self.config.debug,
        }
    }
}

#[async_trait]
impl ChartProvider for TradingViewClient {
    async fn fetch_bars(&self, request: &BarRequest) -> Result<BarSet> {
        let auth = self.authenticate(request).await?;
        if let Some(session) = &auth {
            self.check_layout(session, request.verbose).await;
        } else if request.verbose {
            info!("Proceeding with guest TradingView session");
        }

        let resolved_symbol = search::resolve_symbol(&self.http, &request.symbol).await?;
        let resolution = normalize_chart_timeframe(&request.timeframe);
        let range = request.range.max(MIN_RANGE);
        if request.verbose {
            info!(symbol = %resolved_symbol, timeframe = %resolution, "Using resolved symbol");
        }

        let token = auth.as_ref().map(|a| a.auth_token.as_str());
        let url = ChartSession::url(&self.config.server);
        let mut session = ChartSession::open(&url, token, self.session_options()).await?;

        let spec = SeriesSpec {
            symbol: &resolved_symbol,
            resolution: &resolution,
            range,
            session_mode: self.config.session_mode.as_deref(),
            timezone: &self.config.timezone,
        };
        let fetched = session.fetch_bars(&spec).await;
        session.close().await;
        let bars = fetched?;

        info!(
            symbol = %resolved_symbol,
            timeframe = %resolution,
            bars = bars.len(),
            guest = auth.is_none(),
            "Fetched TradingView bars"
        );

        Ok(BarSet {
            bars,
            using_guest: auth.is_none(),
            resolved_symbol,
            timeframe: resolution,
            requested_range: range,
        })
    }
}
