//! Common types and utilities shared across the ensemble forecaster crates.

pub mod catalog;
pub mod error;
pub mod sample;
pub mod time;

pub use catalog::{CaseKey, Location, LocationCandidate, Model, Variable};
pub use error::{EnsembleError, EnsembleResult};
pub use sample::{EnsembleSample, Figure, ProbabilitySurface, THRESHOLD_STEPS};
pub use time::{hours_since, reference_midnight, reference_midnight_at, tick_label};
