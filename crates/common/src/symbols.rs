use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a dashboard pair maps onto the market-data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    /// Symbol as the provider expects it, e.g. `XAU/USD`.
    pub provider_symbol: String,
    /// Human-readable name shown in the dashboard.
    pub label: String,
    /// Candle interval fetched for this pair. Empty means the provider default.
    #[serde(default)]
    pub interval: String,
}

/// Pairs the chart poller and `/api/charts` know about, keyed by upper-case id.
///
/// Example `config/symbols.toml`:
/// ```toml
/// [symbols.XAUUSD]
/// provider_symbol = "XAU/USD"
/// label = "Gold / XAUUSD"
/// interval = "1h"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCatalog {
    symbols: BTreeMap<String, SymbolMeta>,
}

impl Default for SymbolCatalog {
    fn default() -> Self {
        let mut symbols = BTreeMap::new();
        symbols.insert("XAUUSD".to_string(), meta("XAU/USD", "Gold / XAUUSD"));
        symbols.insert("USDJPY".to_string(), meta("USD/JPY", "USDJPY"));
        symbols.insert("US30".to_string(), meta("DJI", "US30 / Dow Jones"));
        Self { symbols }
    }
}

fn meta(provider_symbol: &str, label: &str) -> SymbolMeta {
    SymbolMeta {
        provider_symbol: provider_symbol.to_string(),
        label: label.to_string(),
        interval: "1h".to_string(),
    }
}

impl SymbolCatalog {
    /// Load a catalogue from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("symbol catalogue at '{path}': {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let parsed: SymbolCatalog =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        let symbols = parsed
            .symbols
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v))
            .collect();
        Ok(Self { symbols })
    }

    pub fn get(&self, pair: &str) -> Option<&SymbolMeta> {
        self.symbols.get(pair)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
