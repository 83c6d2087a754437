//! Registries for the things a forecast case is made of.
//!
//! A case is one (location, variable, model) triple. Variables are a fixed
//! set known to the upstream ensemble endpoint; locations and models are open
//! registries seeded with a built-in default and extended by configuration
//! or by location search.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EnsembleError;

/// A forecast variable offered by the ensemble endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    #[serde(alias = "niederschlag")]
    Precipitation,
    #[serde(alias = "niederschlagssumme")]
    AccumulatedPrecipitation,
    #[serde(alias = "temperatur")]
    Temperature,
    #[serde(alias = "relfeuchte")]
    Humidity,
    #[serde(alias = "taupunkt")]
    DewPoint,
    #[serde(alias = "luftdruck")]
    Pressure,
}

impl Variable {
    pub const ALL: [Variable; 6] = [
        Variable::Precipitation,
        Variable::AccumulatedPrecipitation,
        Variable::Temperature,
        Variable::Humidity,
        Variable::DewPoint,
        Variable::Pressure,
    ];

    /// Registry name, also used in cache keys and file names.
    pub fn name(&self) -> &'static str {
        match self {
            Variable::Precipitation => "precipitation",
            Variable::AccumulatedPrecipitation => "accumulated_precipitation",
            Variable::Temperature => "temperature",
            Variable::Humidity => "humidity",
            Variable::DewPoint => "dew_point",
            Variable::Pressure => "pressure",
        }
    }

    /// Value of the `param` query parameter upstream.
    pub fn slug(&self) -> &'static str {
        match self {
            Variable::Precipitation => "niederschlag",
            Variable::AccumulatedPrecipitation => "niederschlagssumme",
            Variable::Temperature => "temperatur",
            Variable::Humidity => "relfeuchte",
            Variable::DewPoint => "taupunkt",
            Variable::Pressure => "luftdruck",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Variable::Precipitation | Variable::AccumulatedPrecipitation => "mm",
            Variable::Temperature | Variable::DewPoint => "°C",
            Variable::Humidity => "%",
            Variable::Pressure => "hPa",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = EnsembleError;

    /// Accepts the registry name or the upstream slug.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Variable::ALL
            .iter()
            .copied()
            .find(|v| v.name() == needle || v.slug() == needle)
            .ok_or_else(|| EnsembleError::UnknownVariable(s.to_string()))
    }
}

/// An ensemble model, e.g. `rapid_id2` queried as `rapid-id2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub slug: String,
}

impl Model {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
        }
    }

    pub fn builtin() -> Vec<Model> {
        vec![Model::new("rapid_id2", "rapid-id2")]
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A forecast location identified by the upstream city id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl Location {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    pub fn builtin() -> Vec<Location> {
        vec![Location::new("munich", "2867714")]
    }

    /// Lowercase name with every non-alphanumeric character replaced by `_`.
    pub fn file_label(&self) -> String {
        sanitize(&self.name)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One result of the location autocomplete endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub label: String,
    #[serde(default)]
    pub country: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl LocationCandidate {
    /// Label shown in selectors: `"{label}, {country}"`.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.label, self.country)
    }

    pub fn to_location(&self) -> Location {
        Location::new(self.label.clone(), self.id.clone())
    }
}

/// Memo key for per-case cache entries.
///
/// Locations are identified by their upstream id; display names are not
/// unique across countries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseKey {
    pub location_id: String,
    pub variable: Variable,
    pub model: String,
}

impl CaseKey {
    pub fn new(location: &Location, variable: Variable, model: &Model) -> Self {
        Self {
            location_id: location.id.clone(),
            variable,
            model: model.name.clone(),
        }
    }
}

impl fmt::Display for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.location_id, self.variable, self.model)
    }
}

impl FromStr for CaseKey {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let location_id = parts.next();
        let variable = parts.next();
        let model = parts.next();
        match (location_id, variable, model) {
            (Some(location_id), Some(variable), Some(model)) if !location_id.is_empty() && !model.is_empty() => {
                Ok(Self {
                    location_id: location_id.to_string(),
                    variable: variable.parse()?,
                    model: model.to_string(),
                })
            }
            _ => Err(EnsembleError::InvalidParameter {
                param: "case_key".to_string(),
                message: format!("expected location_id:variable:model, got '{}'", s),
            }),
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Upstream ids arrive as either JSON numbers or strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_parses_name_and_slug() {
        assert_eq!("temperature".parse::<Variable>().unwrap(), Variable::Temperature);
        assert_eq!("temperatur".parse::<Variable>().unwrap(), Variable::Temperature);
        assert_eq!("Dew_Point".parse::<Variable>().unwrap(), Variable::DewPoint);
        assert!("snow".parse::<Variable>().is_err());
    }

    #[test]
    fn test_variable_slugs_are_unique() {
        let mut slugs: Vec<_> = Variable::ALL.iter().map(|v| v.slug()).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), Variable::ALL.len());
    }

    #[test]
    fn test_case_key_roundtrip() {
        let key = CaseKey::new(
            &Location::new("munich", "2867714"),
            Variable::Pressure,
            &Model::new("rapid_id2", "rapid-id2"),
        );
        assert_eq!(key.to_string(), "2867714:pressure:rapid_id2");
        assert_eq!(key.to_string().parse::<CaseKey>().unwrap(), key);
        assert!("2867714:pressure:".parse::<CaseKey>().is_err());
        assert!("munich".parse::<CaseKey>().is_err());
    }

    #[test]
    fn test_case_key_ignores_location_name() {
        let model = Model::new("rapid_id2", "rapid-id2");
        let de = CaseKey::new(&Location::new("Munich", "2867714"), Variable::Temperature, &model);
        let us = CaseKey::new(&Location::new("Munich", "5038108"), Variable::Temperature, &model);
        let renamed = CaseKey::new(&Location::new("München", "2867714"), Variable::Temperature, &model);
        assert_ne!(de, us);
        assert_eq!(de, renamed);
    }

    #[test]
    fn test_location_file_label() {
        assert_eq!(Location::new("St. Moritz: Dorf", "1").file_label(), "st__moritz__dorf");
    }

    #[test]
    fn test_candidate_accepts_numeric_id() {
        let json = r#"{"label": "Munich", "country": "DE", "id": 2867714, "extra": true}"#;
        let candidate: LocationCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.id, "2867714");
        assert_eq!(candidate.display_name(), "Munich, DE");
        assert_eq!(candidate.to_location(), Location::new("Munich", "2867714"));
    }
}
