mod api;
mod charts;
mod health;
mod static_files;
mod tradingview;
mod whatsapp;

pub use api::api_router;
pub use health::health_router;
pub use static_files::static_router;
pub use tradingview::AnalysisQuery;
pub use whatsapp::{TestAlertRequest, TEST_SUFFIX};
