//! Ensemble samples and the probability surfaces derived from them.

use serde::{Deserialize, Serialize};

use crate::catalog::Variable;
use crate::error::{EnsembleError, EnsembleResult};

/// Number of thresholds swept between the sample minimum and maximum.
pub const THRESHOLD_STEPS: usize = 100;

/// Raw ensemble sample: one value per (member, time-offset) pair.
///
/// Values are stored row-major by member, so row `m` holds the full time
/// series of `members[m]`. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSample {
    pub members: Vec<String>,
    /// Whole hours since the reference time.
    pub times: Vec<i64>,
    #[serde(with = "nan_as_null")]
    pub values: Vec<f64>,
}

impl EnsembleSample {
    pub fn new(members: Vec<String>, times: Vec<i64>, values: Vec<f64>) -> EnsembleResult<Self> {
        if members.is_empty() || times.is_empty() {
            return Err(EnsembleError::ShapeMismatch(format!(
                "sample needs at least one member and one time, got {}x{}",
                members.len(),
                times.len()
            )));
        }
        if values.len() != members.len() * times.len() {
            return Err(EnsembleError::ShapeMismatch(format!(
                "expected {} values for {} members x {} times, got {}",
                members.len() * times.len(),
                members.len(),
                times.len(),
                values.len()
            )));
        }
        Ok(Self {
            members,
            times,
            values,
        })
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn time_count(&self) -> usize {
        self.times.len()
    }

    pub fn get(&self, member: usize, time: usize) -> f64 {
        self.values[member * self.times.len() + time]
    }

    /// Full time series of one member.
    pub fn member_row(&self, member: usize) -> &[f64] {
        let n = self.times.len();
        &self.values[member * n..(member + 1) * n]
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m == name)
    }

    /// All members' values at one time index.
    pub fn time_column(&self, time: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.members.len()).map(move |m| self.get(m, time))
    }

    /// Minimum and maximum over all non-NaN values.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Exceedance percentages over (time-offset, threshold).
///
/// Stored row-major by time: row `t` holds the percentage of members above
/// each threshold at `times[t]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilitySurface {
    pub variable: Variable,
    pub times: Vec<i64>,
    pub thresholds: Vec<f64>,
    pub values: Vec<f64>,
}

impl ProbabilitySurface {
    pub fn get(&self, time: usize, threshold: usize) -> f64 {
        self.values[time * self.thresholds.len() + threshold]
    }

    pub fn row(&self, time: usize) -> &[f64] {
        let n = self.thresholds.len();
        &self.values[time * n..(time + 1) * n]
    }

    pub fn threshold_range(&self) -> (f64, f64) {
        (
            self.thresholds.first().copied().unwrap_or(0.0),
            self.thresholds.last().copied().unwrap_or(0.0),
        )
    }

    pub fn time_range(&self) -> (i64, i64) {
        (
            self.times.first().copied().unwrap_or(0),
            self.times.last().copied().unwrap_or(0),
        )
    }
}

/// A rendered chart, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub width: u32,
    pub height: u32,
    #[serde(with = "png_base64")]
    pub png: Vec<u8>,
}

/// JSON has no NaN; missing values travel as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect::<Vec<Option<f64>>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// PNG bytes as standard base64 text.
mod png_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EnsembleSample {
        EnsembleSample::new(
            vec!["Main".into(), "P1".into()],
            vec![0, 1, 2],
            vec![1.0, 2.0, 3.0, 4.0, f64::NAN, -1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_indexing() {
        let s = sample();
        assert_eq!(s.get(1, 0), 4.0);
        assert_eq!(s.member_row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(s.time_column(2).collect::<Vec<_>>(), vec![3.0, -1.0]);
        assert_eq!(s.member_index("P1"), Some(1));
        assert_eq!(s.member_index("P9"), None);
    }

    #[test]
    fn test_value_range_skips_nan() {
        assert_eq!(sample().value_range(), Some((-1.0, 4.0)));
    }

    #[test]
    fn test_shape_is_validated() {
        let err = EnsembleSample::new(vec!["Main".into()], vec![0, 1], vec![1.0]).unwrap_err();
        assert!(matches!(err, EnsembleError::ShapeMismatch(_)));
        assert!(EnsembleSample::new(vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_missing_values_survive_json() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("null"));
        let back: EnsembleSample = serde_json::from_str(&json).unwrap();
        assert!(back.get(1, 1).is_nan());
        assert_eq!(back.get(1, 2), -1.0);
    }

    #[test]
    fn test_figure_png_is_base64_text() {
        let figure = Figure {
            width: 1,
            height: 1,
            png: vec![137, 80, 78, 71],
        };
        let json = serde_json::to_string(&figure).unwrap();
        assert_eq!(json, r#"{"width":1,"height":1,"png":"iVBORw=="}"#);
        let back: Figure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, figure);
        assert!(serde_json::from_str::<Figure>(r#"{"width":1,"height":1,"png":"!!"}"#).is_err());
    }
}
