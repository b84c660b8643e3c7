pub mod cache;
pub mod charts;
pub mod poller;
pub mod tradingview;
pub mod twelvedata;

pub use cache::ChartCache;
pub use charts::{normalize_hours, ChartService};
pub use poller::OhlcPoller;
pub use tradingview::TradingViewClient;
pub use twelvedata::TwelveDataClient;
