pub mod rest;

pub use rest::{build_series, SeriesPlan, TwelveDataClient};
