//! Timeframe and timestamp helpers shared by the REST fetcher, the chart
//! client and the alert formatter.

use chrono::DateTime;

/// Leading integer of `s`, the way a lenient config or query parser reads
/// `"15min"` as 15. Returns `None` when `s` does not start with digits.
pub fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Length of one candle of a REST interval such as `15min`, `1h` or `1day`.
/// Anything unrecognised counts as one hour.
pub fn interval_minutes(interval: &str) -> u64 {
    const DEFAULT: u64 = 60;

    let normalized = interval.trim().to_lowercase();
    let digits_len = normalized
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits_len == 0 {
        return DEFAULT;
    }
    let (digits, unit) = normalized.split_at(digits_len);
    let value: u64 = match digits.parse() {
        Ok(v) if v > 0 => v,
        _ => return DEFAULT,
    };

    match unit {
        "min" => value,
        "h" => value.saturating_mul(60),
        "day" => value.saturating_mul(1_440),
        "week" => value.saturating_mul(10_080),
        "month" => value.saturating_mul(43_200),
        _ => DEFAULT,
    }
}

/// Convert a user-facing timeframe (`1h`, `15m`, `day`, `240`) into a chart
/// resolution code: minutes as digits, or `D`/`W`/`M`.
pub fn normalize_chart_timeframe(tf: &str) -> String {
    let lower = tf.trim().to_lowercase();
    if lower.is_empty() {
        return "60".to_string();
    }

    match lower.as_str() {
        "d" | "1d" | "day" => return "D".to_string(),
        "w" | "1w" | "week" => return "W".to_string(),
        "m" | "1m" | "month" => return "M".to_string(),
        _ => {}
    }

    if lower.ends_with('h') {
        return match leading_int(&lower) {
            Some(v) if v > 0 => v
                .checked_mul(60)
                .map(|m| m.to_string())
                .unwrap_or_else(|| "60".to_string()),
            _ => "60".to_string(),
        };
    }
    if lower.ends_with("min") || lower.ends_with('m') {
        return match leading_int(&lower) {
            Some(v) if v > 0 => v.to_string(),
            _ => "1".to_string(),
        };
    }
    if lower.chars().all(|c| c.is_ascii_digit()) {
        return lower;
    }
    "60".to_string()
}

/// Human label for a timeframe, e.g. `"60"` → `"1 hour"`, `"4h"` → `"4 hours"`.
pub fn describe_timeframe(code: &str) -> String {
    let normalized = code.trim().to_lowercase();
    if normalized.is_empty() {
        return String::new();
    }

    let known = match normalized.as_str() {
        "1" => Some("1 minute"),
        "3" => Some("3 minutes"),
        "5" => Some("5 minutes"),
        "15" => Some("15 minutes"),
        "30" => Some("30 minutes"),
        "45" => Some("45 minutes"),
        "60" => Some("1 hour"),
        "120" => Some("2 hours"),
        "180" => Some("3 hours"),
        "240" => Some("4 hours"),
        "360" => Some("6 hours"),
        "480" => Some("8 hours"),
        "720" => Some("12 hours"),
        "d" => Some("daily"),
        "w" => Some("weekly"),
        "m" => Some("monthly"),
        _ => None,
    };
    if let Some(label) = known {
        return label.to_string();
    }

    if normalized.ends_with('h') {
        if let Some(hours) = leading_int(&normalized) {
            return if hours == 1 {
                "1 hour".to_string()
            } else {
                format!("{hours} hours")
            };
        }
    }
    if normalized.ends_with('m') {
        if let Some(minutes) = leading_int(&normalized) {
            return if minutes == 1 {
                "1 minute".to_string()
            } else {
                format!("{minutes} minutes")
            };
        }
    }
    normalized
}

/// Render a unix timestamp (seconds or milliseconds) as
/// `YYYY-MM-DD HH:MM:SS.mmm` in UTC.
pub fn format_tv_timestamp(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let ms = if value < 1e12 { value * 1000.0 } else { value };
    DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_int_reads_prefix_digits() {
        assert_eq!(leading_int("15min"), Some(15));
        assert_eq!(leading_int("  4h"), Some(4));
        assert_eq!(leading_int("-3"), Some(-3));
        assert_eq!(leading_int("h4"), None);
        assert_eq!(leading_int(""), None);
    }

    #[test]
    fn interval_minutes_units() {
        assert_eq!(interval_minutes("15min"), 15);
        assert_eq!(interval_minutes("1h"), 60);
        assert_eq!(interval_minutes("4H"), 240);
        assert_eq!(interval_minutes("1day"), 1_440);
        assert_eq!(interval_minutes("1week"), 10_080);
        assert_eq!(interval_minutes("1month"), 43_200);
    }

    #[test]
    fn interval_minutes_falls_back_to_an_hour() {
        assert_eq!(interval_minutes(""), 60);
        assert_eq!(interval_minutes("0h"), 60);
        assert_eq!(interval_minutes("1y"), 60);
        assert_eq!(interval_minutes("h"), 60);
    }

    #[test]
    fn interval_minutes_saturates_huge_values() {
        assert_eq!(interval_minutes("999999999999999999month"), u64::MAX);
    }

    #[test]
    fn chart_timeframe_normalization() {
        assert_eq!(normalize_chart_timeframe(""), "60");
        assert_eq!(normalize_chart_timeframe("1h"), "60");
        assert_eq!(normalize_chart_timeframe("4h"), "240");
        assert_eq!(normalize_chart_timeframe("15min"), "15");
        assert_eq!(normalize_chart_timeframe("5m"), "5");
        assert_eq!(normalize_chart_timeframe("1m"), "M");
        assert_eq!(normalize_chart_timeframe("Day"), "D");
        assert_eq!(normalize_chart_timeframe("1w"), "W");
        assert_eq!(normalize_chart_timeframe("240"), "240");
        assert_eq!(normalize_chart_timeframe("0h"), "60");
        assert_eq!(normalize_chart_timeframe("weird"), "60");
    }

    #[test]
    fn oversized_hour_count_falls_back_to_an_hour() {
        assert_eq!(normalize_chart_timeframe("999999999999999999h"), "60");
        assert_eq!(normalize_chart_timeframe("153722867280912931h"), "60");
        assert_eq!(normalize_chart_timeframe("153722867280912930h"), "9223372036854775800");
    }

    #[test]
    fn timeframe_labels() {
        assert_eq!(describe_timeframe("60"), "1 hour");
        assert_eq!(describe_timeframe("1h"), "1 hour");
        assert_eq!(describe_timeframe("4h"), "4 hours");
        assert_eq!(describe_timeframe("15m"), "15 minutes");
        assert_eq!(describe_timeframe("D"), "daily");
        assert_eq!(describe_timeframe("1day"), "1day");
        assert_eq!(describe_timeframe(""), "");
    }

    #[test]
    fn tv_timestamps_accept_seconds_and_millis() {
        assert_eq!(
            format_tv_timestamp(1_714_557_600.0).as_deref(),
            Some("2024-05-01 10:00:00.000")
        );
        assert_eq!(
            format_tv_timestamp(1_714_557_600_000.0).as_deref(),
            Some("2024-05-01 10:00:00.000")
        );
        assert_eq!(format_tv_timestamp(f64::NAN), None);
    }
}
