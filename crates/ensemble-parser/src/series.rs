//! Raw chart series and their reshape into an ensemble sample.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use ensemble_common::{hours_since, EnsembleError, EnsembleResult, EnsembleSample};

/// One chart series as it appears in the payload. Extra chart options
/// (colors, markers, z-index...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSeries {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: Vec<RawPoint>,
}

/// A data point, either `[epoch_ms, value]` or `{x: epoch_ms, y: value}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum RawPoint {
    Pair(f64, Option<f64>),
    Object { x: f64, y: Option<f64> },
}

impl RawPoint {
    pub fn timestamp_ms(&self) -> f64 {
        match *self {
            RawPoint::Pair(x, _) | RawPoint::Object { x, .. } => x,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            RawPoint::Pair(_, y) | RawPoint::Object { y, .. } => y.unwrap_or(f64::NAN),
        }
    }
}

/// Reshape series into a (member, time) sample.
///
/// The time axis comes from the first series. Every member must have the
/// same number of points. A repeated member name replaces the earlier data
/// but keeps the earlier position.
pub fn build_sample(series: &[RawSeries], reference: DateTime<Utc>) -> EnsembleResult<EnsembleSample> {
    let first = series
        .first()
        .ok_or_else(|| EnsembleError::NoData("payload contains no series".to_string()))?;
    if first.data.is_empty() {
        return Err(EnsembleError::NoData(format!(
            "member '{}' has no data points",
            first.name
        )));
    }

    let times: Vec<i64> = first
        .data
        .iter()
        .map(|p| hours_since(reference, p.timestamp_ms()))
        .collect();

    let mut members: Vec<String> = Vec::with_capacity(series.len());
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(series.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (idx, s) in series.iter().enumerate() {
        if s.data.len() != times.len() {
            return Err(EnsembleError::ShapeMismatch(format!(
                "member '{}' has {} points, expected {}",
                s.name,
                s.data.len(),
                times.len()
            )));
        }
        let name = if s.name.is_empty() {
            format!("member_{}", idx)
        } else {
            s.name.clone()
        };
        let row: Vec<f64> = s.data.iter().map(RawPoint::value).collect();

        match positions.get(&name) {
            Some(&pos) => rows[pos] = row,
            None => {
                positions.insert(name.clone(), members.len());
                members.push(name);
                rows.push(row);
            }
        }
    }

    tracing::debug!(members = members.len(), times = times.len(), "Reshaped ensemble series");
    EnsembleSample::new(members, times, rows.concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
    }

    fn series(name: &str, values: &[Option<f64>]) -> RawSeries {
        let start = reference().timestamp_millis() as f64;
        RawSeries {
            name: name.to_string(),
            data: values
                .iter()
                .enumerate()
                .map(|(i, v)| RawPoint::Pair(start + i as f64 * 3_600_000.0, *v))
                .collect(),
        }
    }

    #[test]
    fn test_build_sample() {
        let sample = build_sample(
            &[series("Main", &[Some(1.0), Some(2.0)]), series("P1", &[None, Some(4.0)])],
            reference(),
        )
        .unwrap();
        assert_eq!(sample.members, vec!["Main", "P1"]);
        assert_eq!(sample.times, vec![0, 1]);
        assert!(sample.get(1, 0).is_nan());
        assert_eq!(sample.get(1, 1), 4.0);
    }

    #[test]
    fn test_empty_payload_is_no_data() {
        let err = build_sample(&[], reference()).unwrap_err();
        assert!(err.is_precondition());
        let err = build_sample(&[series("Main", &[])], reference()).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_length_mismatch() {
        let err = build_sample(
            &[series("Main", &[Some(1.0), Some(2.0)]), series("P1", &[Some(1.0)])],
            reference(),
        )
        .unwrap_err();
        assert!(matches!(err, EnsembleError::ShapeMismatch(_)));
    }

    #[test]
    fn test_duplicate_member_keeps_first_position() {
        let sample = build_sample(
            &[
                series("Main", &[Some(1.0)]),
                series("P1", &[Some(2.0)]),
                series("Main", &[Some(9.0)]),
            ],
            reference(),
        )
        .unwrap();
        assert_eq!(sample.members, vec!["Main", "P1"]);
        assert_eq!(sample.values, vec![9.0, 2.0]);
    }

    #[test]
    fn test_point_shapes_deserialize() {
        let points: Vec<RawPoint> =
            serde_json::from_str(r#"[[1000, 2.5], [2000, null], {"x": 3000, "y": 1}]"#).unwrap();
        assert_eq!(points[0].timestamp_ms(), 1000.0);
        assert_eq!(points[0].value(), 2.5);
        assert!(points[1].value().is_nan());
        assert_eq!(points[2].timestamp_ms(), 3000.0);
        assert_eq!(points[2].value(), 1.0);
    }
}
