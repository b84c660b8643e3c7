pub mod analysis;
pub mod indicators;
pub mod matches;

pub use analysis::{analyze, fetch_analysis, AnalysisOptions};
pub use indicators::SmaIndicator;
pub use matches::evaluate_matches;
