pub mod auth;
pub mod client;
pub mod protocol;
pub mod search;
pub mod session;

pub use client::TradingViewClient;
pub use session::{ChartSession, SeriesSpec, SessionOptions};
