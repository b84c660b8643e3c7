use serde_json::{json, Value};

use common::timeframe::format_tv_timestamp;
use common::{Bar, Result};

const MARKER: &str = "~m~";
const HEARTBEAT: &str = "~h~";

/// Series id used for the single price series of a chart session.
pub const PRICE_SERIES: &str = "$prices";

/// Token sent by anonymous sessions.
pub const GUEST_TOKEN: &str = "unauthorized_user_token";

// ─── Framing ─────────────────────────────────────────────────────────────────

/// One decoded payload from the chart websocket.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `~h~N` keep-alive. The server expects it echoed back verbatim.
    Heartbeat(String),
    /// `{"m": method, "p": params}` call.
    Call { method: String, params: Vec<Value> },
    /// Anything else. The first packet of a connection is the session hello.
    Info(Value),
}

/// Wrap `payload` as `~m~<len>~m~<payload>`. The length counts UTF-16 units.
pub fn encode(payload: &str) -> String {
    format!("{MARKER}{}{MARKER}{payload}", payload.encode_utf16().count())
}

/// Encode a `{"m","p"}` call.
pub fn encode_call(method: &str, params: Value) -> String {
    encode(&json!({ "m": method, "p": params }).to_string())
}

/// Split a websocket text message into its framed payloads.
pub fn split_frames(data: &str) -> Vec<&str> {
    let mut frames = Vec::new();
    let mut rest = data;
    while let Some(after) = rest.strip_prefix(MARKER) {
        let Some(end) = after.find(MARKER) else {
            break;
        };
        let Ok(len) = after[..end].parse::<usize>() else {
            break;
        };
        let body = &after[end + MARKER.len()..];
        let cut = utf16_offset(body, len);
        frames.push(&body[..cut]);
        rest = &body[cut..];
    }
    frames
}

/// Decode every payload contained in one websocket text message.
pub fn decode(data: &str) -> Result<Vec<Packet>> {
    split_frames(data)
        .into_iter()
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            if frame.starts_with(HEARTBEAT) {
                return Ok(Packet::Heartbeat(frame.to_string()));
            }
            let value: Value = serde_json::from_str(frame)?;
            Ok(match value.get("m").and_then(Value::as_str) {
                Some(method) => Packet::Call {
                    method: method.to_string(),
                    params: value
                        .get("p")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default(),
                },
                None => Packet::Info(value),
            })
        })
        .collect()
}

/// Byte offset after `units` UTF-16 code units of `s` (clamped to its length).
fn utf16_offset(s: &str, units: usize) -> usize {
    let mut seen = 0;
    for (idx, ch) in s.char_indices() {
        if seen >= units {
            return idx;
        }
        seen += ch.len_utf16();
    }
    s.len()
}

// ─── Chart session payloads ──────────────────────────────────────────────────

/// `=`-prefixed symbol descriptor passed to `resolve_symbol`.
/// Only `regular` and `extended` session modes are forwarded.
pub fn symbol_init(symbol: &str, session_mode: Option<&str>) -> String {
    let mut init = json!({ "symbol": symbol, "adjustment": "splits" });
    if let Some(mode) = session_mode
        .map(str::to_lowercase)
        .filter(|m| m == "regular" || m == "extended")
    {
        init["session"] = Value::String(mode);
    }
    format!("={init}")
}

/// Human-readable message for a server-side error call, or `None` when
/// `method` is not an error.
pub fn error_text(method: &str, params: &[Value]) -> Option<String> {
    let label = match method {
        "symbol_error" => "Symbol error",
        "series_error" => "Series error",
        "critical_error" => "Critical error",
        "protocol_error" => "Protocol error",
        _ => return None,
    };
    // The chart session id leads the params of chart-scoped errors.
    let skip = usize::from(method == "symbol_error" || method == "series_error");
    let detail: Vec<String> = params
        .iter()
        .skip(skip)
        .map(|p| match p {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    Some(if detail.is_empty() {
        label.to_string()
    } else {
        format!("{label}: {}", detail.join(" "))
    })
}

// ─── Series data ─────────────────────────────────────────────────────────────

/// Raw bar as carried by `timescale_update` / `du` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Unix seconds.
    pub time: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl SeriesPoint {
    pub fn key(&self) -> i64 {
        self.time.round() as i64
    }

    pub fn into_bar(self) -> Bar {
        Bar {
            time: format_tv_timestamp(self.time),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Extract the points of `series` from a `timescale_update` / `du` call.
/// Layout: `p[1][series].s = [{ i, v: [time, open, high, low, close, volume] }]`.
pub fn series_points(params: &[Value], series: &str) -> Vec<SeriesPoint> {
    let Some(items) = params
        .get(1)
        .and_then(|p| p.get(series))
        .and_then(|s| s.get("s"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let v = item.get("v")?.as_array()?;
            let num = |i: usize| v.get(i).and_then(Value::as_f64).filter(|x| x.is_finite());
            Some(SeriesPoint {
                time: num(0)?,
                open: num(1),
                high: num(2),
                low: num(3),
                close: num(4),
                volume: num(5),
            })
        })
        .collect()
}
