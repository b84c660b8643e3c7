use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use common::{Bar, Error, Result};

use super::auth::TRADINGVIEW_ORIGIN;
use super::protocol::{self, Packet, SeriesPoint, GUEST_TOKEN, PRICE_SERIES};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Minimum number of bars requested from a chart series.
pub const MIN_RANGE: usize = 20;

/// What to load into the chart session.
#[derive(Debug, Clone)]
pub struct SeriesSpec<'a> {
    pub symbol: &'a str,
    /// TradingView resolution code (`60`, `D`, ...).
    pub resolution: &'a str,
    pub range: usize,
    pub session_mode: Option<&'a str>,
    pub timezone: &'a str,
}

/// Connection-level options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub login_timeout: Duration,
    pub data_timeout: Duration,
    /// Log every raw frame.
    pub debug: bool,
}

/// One websocket connection carrying a single chart session.
pub struct ChartSession {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    id: String,
    options: SessionOptions,
}

impl ChartSession {
    pub fn url(server: &str) -> String {
        format!("wss://{server}.tradingview.com/socket.io/websocket?type=chart")
    }

    /// Connect to `url`, wait for the server hello, authenticate and open a
    /// chart session. `auth_token` is `None` for guest sessions.
    pub async fn open(url: &str, auth_token: Option<&str>, options: SessionOptions) -> Result<Self> {
        let mut request = url.into_client_request().map_err(ws_err)?;
        request
            .headers_mut()
            .insert(ORIGIN, HeaderValue::from_static(TRADINGVIEW_ORIGIN));

        let (stream, _) = connect_async(request).await.map_err(ws_err)?;
        let (write, read) = stream.split();
        let mut session = Self {
            write,
            read,
            id: chart_session_id(),
            options,
        };

        timeout(session.options.login_timeout, session.await_hello())
            .await
            .map_err(|_| Error::Timeout("TradingView client login timed out".to_string()))??;

        session
            .send("set_auth_token", json!([auth_token.unwrap_or(GUEST_TOKEN)]))
            .await?;
        let id = session.id.clone();
        session.send("chart_create_session", json!([id, ""])).await?;
        debug!(session = %session.id, guest = auth_token.is_none(), "Chart session opened");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Load `spec` and collect its bars, oldest first.
    ///
    /// Collection ends once `max(range, 20)` bars have arrived or the server
    /// reports the series complete. Only the newest `max(range, 20)` bars are
    /// returned.
    pub async fn fetch_bars(&mut self, spec: &SeriesSpec<'_>) -> Result<Vec<Bar>> {
        let range = spec.range.max(MIN_RANGE);
        let id = self.id.clone();

        if !spec.timezone.is_empty() {
            self.send("switch_timezone", json!([id, spec.timezone])).await?;
        }
        self.send(
            "resolve_symbol",
            json!([id, "ser_1", protocol::symbol_init(spec.symbol, spec.session_mode)]),
        )
        .await?;
        self.send(
            "create_series",
            json!([id, PRICE_SERIES, "s1", "ser_1", spec.resolution, range]),
        )
        .await?;

        let points = timeout(self.options.data_timeout, self.collect(range))
            .await
            .map_err(|_| Error::Timeout("Timed out waiting for chart data".to_string()))??;

        let skip = points.len().saturating_sub(range);
        Ok(points
            .into_values()
            .skip(skip)
            .map(SeriesPoint::into_bar)
            .collect())
    }

    /// Delete the chart session and close the socket. Failures are ignored.
    pub async fn close(mut self) {
        let id = self.id.clone();
        if let Err(e) = self.send("chart_delete_session", json!([id])).await {
            debug!(error = %e, "chart_delete_session failed");
        }
        let _ = self.write.close().await;
    }

    async fn collect(&mut self, range: usize) -> Result<BTreeMap<i64, SeriesPoint>> {
        let mut points = BTreeMap::new();
        loop {
            let Some(packets) = self.next_packets().await? else {
                return Err(Error::WebSocket(
                    "TradingView closed the connection".to_string(),
                ));
            };

            for packet in packets {
                let Packet::Call { method, params } = packet else {
                    continue;
                };
                if let Some(message) = protocol::error_text(&method, &params) {
                    return Err(Error::Other(message));
                }
                match method.as_str() {
                    "timescale_update" | "du" => {
                        for point in protocol::series_points(&params, PRICE_SERIES) {
                            points.insert(point.key(), point);
                        }
                    }
                    "series_completed" => {
                        debug!(bars = points.len(), "Series completed");
                        return Ok(points);
                    }
                    _ => {}
                }
            }

            if points.len() >= range {
                return Ok(points);
            }
        }
    }

    async fn await_hello(&mut self) -> Result<Value> {
        loop {
            let Some(packets) = self.next_packets().await? else {
                return Err(Error::WebSocket(
                    "TradingView closed the connection".to_string(),
                ));
            };
            for packet in packets {
                match packet {
                    Packet::Info(hello) => return Ok(hello),
                    Packet::Call { method, params } => {
                        if let Some(message) = protocol::error_text(&method, &params) {
                            return Err(Error::Other(message));
                        }
                    }
                    Packet::Heartbeat(_) => {}
                }
            }
        }
    }

    /// Read one websocket message. Heartbeats are answered here and still
    /// returned. `None` once the server closes the connection.
    async fn next_packets(&mut self) -> Result<Option<Vec<Packet>>> {
        let Some(msg) = self.read.next().await else {
            return Ok(None);
        };
        let text = match msg.map_err(ws_err)? {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(None),
            _ => return Ok(Some(Vec::new())),
        };
        if self.options.debug {
            debug!(frame = %text, "TradingView frame");
        }

        let packets = protocol::decode(&text)?;
        for packet in &packets {
            if let Packet::Heartbeat(beat) = packet {
                self.send_raw(protocol::encode(beat)).await?;
            }
        }
        Ok(Some(packets))
    }

    async fn send(&mut self, method: &str, params: Value) -> Result<()> {
        self.send_raw(protocol::encode_call(method, params)).await
    }

    async fn send_raw(&mut self, frame: String) -> Result<()> {
        if self.options.debug {
            debug!(frame = %frame, "TradingView send");
        }
        self.write.send(Message::Text(frame)).await.map_err(ws_err)
    }
}

/// `cs_` followed by 12 random alphanumerics.
fn chart_session_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("cs_{suffix}")
}

fn ws_err(e: impl std::fmt::Display) -> Error {
    Error::WebSocket(e.to_string())
}
