pub mod config;
pub mod error;
pub mod provider;
pub mod symbols;
pub mod timeframe;
pub mod types;

pub use config::{AlertConfig, Config, TradingViewConfig, TwelveDataConfig};
pub use error::{Error, Result};
pub use provider::{CandleSource, ChartProvider, Notifier};
pub use symbols::{SymbolCatalog, SymbolMeta};
pub use types::*;
