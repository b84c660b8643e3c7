use std::time::Duration;

use crate::timeframe::leading_int;
use crate::SortOrder;

/// All configuration loaded from environment variables at startup.
/// Nothing is required: missing or malformed values fall back to defaults.
#[derive(Debug, Clone)]
pub struct Config {
    // HTTP server
    pub server_port: u16,
    pub app_username: String,
    pub app_password: String,
    pub cors_allowed_origins: Vec<String>,

    // Logging
    pub log_dir: String,

    // Chart polling (REST provider)
    pub symbols_config_path: Option<String>,
    pub poll_lookback_hours: u64,
    pub poll_interval: Duration,
    pub chart_cache_ttl: Duration,

    pub twelvedata: TwelveDataConfig,
    pub tradingview: TradingViewConfig,
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone)]
pub struct TwelveDataConfig {
    /// Empty disables the integration.
    pub api_key: String,
    pub base_url: String,
    pub time_series_endpoint: String,
    pub default_interval: String,
    pub timezone: Option<String>,
    pub order: SortOrder,
    pub max_output_size: usize,
}

impl TwelveDataConfig {
    pub fn enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TradingViewConfig {
    pub default_symbol: String,
    pub default_interval: String,
    pub fetch_range: usize,
    pub sma_length: usize,
    pub recent_count: usize,
    pub username: String,
    pub password: String,
    pub layout_id: Option<String>,
    /// Data server prefix, e.g. `data` or `prodata`.
    pub server: String,
    pub timezone: String,
    pub session_mode: Option<String>,
    pub login_timeout: Duration,
    pub data_timeout: Duration,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub enabled: bool,
    pub callmebot_phone: String,
    pub callmebot_api_key: String,
    pub symbols: Vec<String>,
    pub timeframe: String,
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    pub max_retries: u32,
}

impl AlertConfig {
    pub fn has_credentials(&self) -> bool {
        !self.callmebot_phone.is_empty() && !self.callmebot_api_key.is_empty()
    }
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let positive = |key: &str, fallback: u64| parse_positive_int(get(key).as_deref(), fallback);
        let millis = |key: &str, fallback: u64| Duration::from_millis(positive(key, fallback));

        let twelvedata = TwelveDataConfig {
            api_key: text("TWELVEDATA_API_KEY").unwrap_or_default(),
            base_url: text("TWELVEDATA_BASE_URL")
                .unwrap_or_else(|| "https://api.twelvedata.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            time_series_endpoint: text("TWELVEDATA_TIME_SERIES_ENDPOINT")
                .unwrap_or_else(|| "/time_series".to_string()),
            default_interval: text("TWELVEDATA_DEFAULT_INTERVAL")
                .unwrap_or_else(|| "1h".to_string()),
            timezone: text("TWELVEDATA_TIMEZONE"),
            order: match text("TWELVEDATA_ORDER").map(|v| v.to_lowercase()).as_deref() {
                Some("asc") => SortOrder::Asc,
                _ => SortOrder::Desc,
            },
            max_output_size: positive("TWELVEDATA_MAX_OUTPUTSIZE", 5000) as usize,
        };

        let tradingview = TradingViewConfig {
            default_symbol: text("TRADINGVIEW_SYMBOL").unwrap_or_else(|| "OANDA:XAUUSD".to_string()),
            default_interval: text("TRADINGVIEW_INTERVAL").unwrap_or_else(|| "1h".to_string()),
            fetch_range: positive("TRADINGVIEW_FETCH_RANGE", 120) as usize,
            sma_length: positive("TRADINGVIEW_SMA_LENGTH", 9) as usize,
            recent_count: positive("TRADINGVIEW_RECENT_COUNT", 10) as usize,
            username: text("TRADINGVIEW_USERNAME").unwrap_or_default(),
            password: text("TRADINGVIEW_PASSWORD").unwrap_or_default(),
            layout_id: text("TRADINGVIEW_LAYOUT_ID"),
            server: text("TRADINGVIEW_SERVER").unwrap_or_else(|| "data".to_string()),
            timezone: text("TRADINGVIEW_TIMEZONE").unwrap_or_else(|| "Etc/UTC".to_string()),
            session_mode: text("TRADINGVIEW_SESSION_MODE"),
            login_timeout: millis("TRADINGVIEW_LOGIN_TIMEOUT_MS", 15_000),
            data_timeout: millis("TRADINGVIEW_DATA_TIMEOUT_MS", 20_000),
            debug: text("TRADINGVIEW_DEBUG").as_deref() == Some("1"),
        };

        let callmebot_phone = text("CALLMEBOT_PHONE").unwrap_or_default();
        let callmebot_api_key = text("CALLMEBOT_API_KEY").unwrap_or_default();

        let mut symbols: Vec<String> = Vec::new();
        let listed = parse_symbol_list(get("WHATSAPP_ALERT_SYMBOLS").as_deref())
            .into_iter()
            .chain(parse_symbol_list(get("WHATSAPP_ALERT_SYMBOL").as_deref()));
        for symbol in listed {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        if symbols.is_empty() {
            symbols.push(tradingview.default_symbol.clone());
        }

        let alerts = AlertConfig {
            enabled: parse_bool_flag(
                get("WHATSAPP_ALERT_ENABLED").as_deref(),
                !callmebot_phone.is_empty() && !callmebot_api_key.is_empty(),
            ),
            callmebot_phone,
            callmebot_api_key,
            symbols,
            timeframe: text("WHATSAPP_ALERT_TIMEFRAME")
                .unwrap_or_else(|| tradingview.default_interval.clone()),
            poll_interval: millis("WHATSAPP_POLL_INTERVAL_MS", 60 * 60 * 1000),
            retry_interval: millis("WHATSAPP_RETRY_INTERVAL_MS", 5 * 60 * 1000),
            max_retries: positive("WHATSAPP_MAX_RETRIES", 3).max(1) as u32,
        };

        Config {
            server_port: text("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            app_username: text("APP_USERNAME").unwrap_or_else(|| "admin".to_string()),
            app_password: text("APP_PASSWORD").unwrap_or_else(|| "admin".to_string()),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            log_dir: text("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            symbols_config_path: text("SYMBOLS_CONFIG_PATH"),
            poll_lookback_hours: positive("POLL_LOOKBACK_HOURS", 24),
            poll_interval: millis("POLL_INTERVAL_MS", 5 * 60 * 1000),
            chart_cache_ttl: millis("CHART_CACHE_TTL_MS", 5 * 60 * 1000),
            twelvedata,
            tradingview,
            alerts,
        }
    }
}

/// Leading integer of `value` when it is greater than zero, else `fallback`.
pub fn parse_positive_int(value: Option<&str>, fallback: u64) -> u64 {
    match value.and_then(leading_int) {
        Some(v) if v > 0 => v as u64,
        _ => fallback,
    }
}

/// Lenient boolean: `1/true/yes/y` and `0/false/no/n`, anything else is `default`.
pub fn parse_bool_flag(value: Option<&str>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => true,
        "0" | "false" | "no" | "n" => false,
        _ => default,
    }
}

/// Split a comma- or whitespace-separated symbol list.
pub fn parse_symbol_list(input: Option<&str>) -> Vec<String> {
    input
        .unwrap_or_default()
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
