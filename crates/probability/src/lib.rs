//! Exceedance probabilities for ensemble forecasts.
//!
//! For every time offset, sweep [`THRESHOLD_STEPS`] evenly spaced thresholds
//! between the sample-wide minimum and maximum. At each threshold, count the
//! members strictly above it and report that count as a percentage.

pub mod stats;

pub use stats::{ensemble_mean, member_series};

use ensemble_common::{
    EnsembleError, EnsembleResult, EnsembleSample, ProbabilitySurface, Variable, THRESHOLD_STEPS,
};
use rayon::prelude::*;

/// Time rows below this count are computed sequentially.
const PARALLEL_THRESHOLD: usize = 64;

/// `count` evenly spaced values over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            values[count - 1] = stop;
            values
        }
    }
}

/// Convert a sample into its probability surface.
///
/// Output row `t`, column `s` is `100 * |{m : x[m][t] > thr[s]}| / M`.
/// `NaN` values never exceed a threshold but still count toward `M`.
pub fn convert_to_probabilities(
    sample: &EnsembleSample,
    variable: Variable,
) -> EnsembleResult<ProbabilitySurface> {
    let (min, max) = sample
        .value_range()
        .ok_or_else(|| EnsembleError::NoData("sample contains only missing values".to_string()))?;
    let thresholds = linspace(min, max, THRESHOLD_STEPS);
    let members = sample.member_count() as f64;

    let row = |t: usize| -> Vec<f64> {
        let column: Vec<f64> = sample.time_column(t).collect();
        thresholds
            .iter()
            .map(|&thr| column.iter().filter(|&&v| v > thr).count() as f64 / members * 100.0)
            .collect()
    };

    let rows: Vec<Vec<f64>> = if sample.time_count() >= PARALLEL_THRESHOLD {
        (0..sample.time_count()).into_par_iter().map(row).collect()
    } else {
        (0..sample.time_count()).map(row).collect()
    };

    tracing::debug!(
        variable = %variable,
        members = sample.member_count(),
        times = sample.time_count(),
        min,
        max,
        "Computed probability surface"
    );

    Ok(ProbabilitySurface {
        variable,
        times: sample.times.clone(),
        thresholds,
        values: rows.concat(),
    })
}
