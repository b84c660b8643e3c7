use reqwest::header::ORIGIN;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Error, Result};

use super::auth::TRADINGVIEW_ORIGIN;

const SEARCH_V3_URL: &str = "https://symbol-search.tradingview.com/symbol_search/v3/";
const SEARCH_V1_URL: &str = "https://symbol-search.tradingview.com/symbol_search/";

/// Map a user-supplied symbol (`XAUUSD`, `OANDA:XAUUSD`) to a TradingView id.
///
/// Queries the full input and, for prefixed input, the bare ticker against
/// both search endpoints. Search failures are skipped; when nothing matches
/// the trimmed input is used as-is.
pub async fn resolve_symbol(http: &Client, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Other("Missing TradingView symbol".to_string()));
    }

    for query in search_queries(trimmed) {
        for endpoint in [SEARCH_V3_URL, SEARCH_V1_URL] {
            match search(http, endpoint, &query).await {
                Ok(ids) => {
                    if let Some(id) = pick_symbol(trimmed, &query, &ids) {
                        return Ok(id);
                    }
                }
                Err(e) => debug!(query = %query, endpoint, error = %e, "Symbol search failed"),
            }
        }
    }

    Ok(trimmed.to_string())
}

async fn search(http: &Client, endpoint: &str, query: &str) -> Result<Vec<String>> {
    let request = if endpoint == SEARCH_V3_URL {
        http.get(endpoint)
            .query(&[("text", query), ("search_type", ""), ("start", "0")])
    } else {
        http.get(endpoint).query(&[("text", query), ("type", "")])
    };

    let resp = request
        .header(ORIGIN, TRADINGVIEW_ORIGIN)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::provider(status.as_u16(), format!("Symbol search responded with {status}")));
    }
    let body: Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
    Ok(parse_search_results(&body))
}

/// The full input plus, for `EXCHANGE:TICKER` input, the bare ticker.
pub fn search_queries(trimmed: &str) -> Vec<String> {
    let mut queries = vec![trimmed.to_string()];
    let bare = symbol_only(trimmed);
    if !bare.is_empty() && bare != trimmed {
        queries.push(bare.to_string());
    }
    queries
}

fn symbol_only(trimmed: &str) -> &str {
    trimmed
        .split_once(':')
        .map_or(trimmed, |(_, rest)| rest.trim())
}

/// Symbol ids from either search response shape: v3 `{ "symbols": [..] }`
/// or v1 `[..]`. Ids are `PREFIX:SYMBOL`, falling back to the first word of
/// the exchange name.
pub fn parse_search_results(body: &Value) -> Vec<String> {
    let items = body
        .get("symbols")
        .and_then(Value::as_array)
        .or_else(|| body.as_array());
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let symbol = strip_highlight(item.get("symbol")?.as_str()?);
            let prefix = item
                .get("prefix")
                .and_then(Value::as_str)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .or_else(|| {
                    item.get("exchange")
                        .and_then(Value::as_str)
                        .and_then(|e| e.split_whitespace().next())
                        .map(str::to_uppercase)
                })?;
            Some(format!("{prefix}:{symbol}"))
        })
        .collect()
}

/// Exact id match first, then an id equal to the query or containing the
/// bare ticker.
pub fn pick_symbol(trimmed: &str, query: &str, ids: &[String]) -> Option<String> {
    if let Some(exact) = ids.iter().find(|id| id.as_str() == trimmed) {
        return Some(exact.clone());
    }
    let bare = symbol_only(trimmed);
    ids.iter()
        .find(|id| id.as_str() == query || id.contains(bare))
        .cloned()
}

fn strip_highlight(text: &str) -> String {
    text.replace("<em>", "").replace("</em>", "")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn queries_include_bare_ticker() {
        assert_eq!(search_queries("OANDA:XAUUSD"), vec!["OANDA:XAUUSD", "XAUUSD"]);
        assert_eq!(search_queries("XAUUSD"), vec!["XAUUSD"]);
        assert_eq!(search_queries("OANDA:"), vec!["OANDA:"]);
    }

    #[test]
    fn parse_v3_results() {
        let body = json!({
            "symbols_remaining": 0,
            "symbols": [
                { "symbol": "<em>XAUUSD</em>", "exchange": "OANDA", "type": "commodity" },
                { "symbol": "XAUUSD", "exchange": "FXCM Forex", "prefix": "FX_IDC" },
                { "exchange": "NOSYMBOL" }
            ]
        });
        assert_eq!(
            parse_search_results(&body),
            vec!["OANDA:XAUUSD", "FX_IDC:XAUUSD"]
        );
    }

    #[test]
    fn parse_v1_results() {
        let body = json!([{ "symbol": "DJI", "exchange": "dj index" }]);
        assert_eq!(parse_search_results(&body), vec!["DJ:DJI"]);
        assert!(parse_search_results(&json!({ "error": "x" })).is_empty());
    }

    #[test]
    fn pick_prefers_exact_id() {
        let ids = vec!["FX:XAUUSD".to_string(), "OANDA:XAUUSD".to_string()];
        assert_eq!(
            pick_symbol("OANDA:XAUUSD", "OANDA:XAUUSD", &ids).as_deref(),
            Some("OANDA:XAUUSD")
        );
        assert_eq!(
            pick_symbol("XAUUSD", "XAUUSD", &ids).as_deref(),
            Some("FX:XAUUSD")
        );
        assert_eq!(pick_symbol("EURUSD", "EURUSD", &ids), None);
    }

    #[tokio::test]
    async fn empty_symbol_is_rejected() {
        let err = resolve_symbol(&Client::new(), "   ").await.unwrap_err();
        assert_eq!(err.to_string(), "Missing TradingView symbol");
    }
}
