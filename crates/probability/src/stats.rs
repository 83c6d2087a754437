//! Per-time summaries of an ensemble, used for chart overlays.

use ensemble_common::EnsembleSample;

/// Mean over non-missing members at each time. `NaN` where every member is
/// missing.
pub fn ensemble_mean(sample: &EnsembleSample) -> Vec<f64> {
    (0..sample.time_count())
        .map(|t| {
            let (sum, n) = sample
                .time_column(t)
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
            if n == 0 {
                f64::NAN
            } else {
                sum / n as f64
            }
        })
        .collect()
}

/// Time series of the named member, if present.
pub fn member_series<'a>(sample: &'a EnsembleSample, name: &str) -> Option<&'a [f64]> {
    sample.member_index(name).map(|m| sample.member_row(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_skips_missing() {
        let sample = EnsembleSample::new(
            vec!["Main".into(), "P1".into()],
            vec![0, 1],
            vec![1.0, f64::NAN, 3.0, f64::NAN],
        )
        .unwrap();
        let mean = ensemble_mean(&sample);
        assert_eq!(mean[0], 2.0);
        assert!(mean[1].is_nan());
    }

    #[test]
    fn test_member_series() {
        let sample =
            EnsembleSample::new(vec!["Main".into(), "P1".into()], vec![0], vec![1.0, 2.0]).unwrap();
        assert_eq!(member_series(&sample, "P1"), Some(&[2.0][..]));
        assert_eq!(member_series(&sample, "Control"), None);
    }
}
