use chrono::NaiveDateTime;

use common::timeframe::describe_timeframe;
use common::AnalyzedCandle;

/// Compose the WhatsApp text for a verified previous candle.
///
/// Returns an empty string unless `previous` matched green-above or
/// red-below.
pub fn build_alert_message(
    symbol: &str,
    timeframe: &str,
    previous: Option<&AnalyzedCandle>,
    forming: Option<&AnalyzedCandle>,
) -> String {
    let Some(previous) = previous.filter(|c| c.matches.verified()) else {
        return String::new();
    };

    let pattern = if previous.matches.green_above {
        "it's a green above the MA"
    } else {
        "it's a red below the MA"
    };
    let label = describe_timeframe(timeframe);
    let timeframe_text = if label.is_empty() {
        String::new()
    } else {
        format!(" on the {label} chart")
    };
    let closed = previous
        .timestamp
        .as_deref()
        .map(format_close_time)
        .unwrap_or_else(|| "the last candle".to_string());

    let mut parts = vec![format!(
        "I juust spotted a candle on the {} pair similar to your pattern{timeframe_text} (closed {closed}), {pattern}.",
        pair_name(symbol)
    )];
    if let Some(close) = previous.close.filter(|c| c.is_finite()) {
        parts.push(format!("It closed around {close:.2}."));
    }
    if let Some(close) = forming.and_then(|c| c.close).filter(|c| c.is_finite()) {
        parts.push(format!("The one forming now is hovering close to {close:.2}."));
    }
    parts.push("Please do well to check it out.".to_string());
    parts.join(" ")
}

/// `OANDA:XAUUSD` → `xauusd`.
pub fn pair_name(symbol: &str) -> String {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return "pair".to_string();
    }
    trimmed
        .rsplit(':')
        .next()
        .unwrap_or(trimmed)
        .to_lowercase()
}

/// `2024-01-02 03:00:00.000` → `Jan 2, 2024, 03:00 UTC`. Other input is
/// returned unchanged.
pub fn format_close_time(timestamp: &str) -> String {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| dt.format("%b %-d, %Y, %H:%M UTC").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}
