//! Persistent memo cache for the ensemble forecaster.
//!
//! Three tables share one JSON file on disk:
//! - raw samples keyed by the content hash of the downloaded page
//! - probability surfaces keyed by case
//! - rendered figures keyed by case

pub mod cache;
pub mod hash;

pub use cache::{CacheStats, ForecastCache};
pub use hash::content_hash;
