//! Configuration loading for the forecaster.
//!
//! One YAML file holds the upstream endpoints, the location and model
//! registries, the variables processed in batch mode and the chart layout.
//! Every section is optional; a missing file means built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use tracing::{debug, info, warn};

use ensemble_common::{Location, Model, Variable};
use renderer::ChartConfig;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecasterConfig {
    pub source: SourceConfig,
    pub locations: Vec<Location>,
    pub models: Vec<Model>,
    /// Variables processed in batch mode.
    pub variables: Vec<Variable>,
    pub render: ChartConfig,
    pub cache_path: PathBuf,
    pub plots_dir: PathBuf,
    /// Cases processed concurrently in batch mode.
    pub max_concurrent: usize,
    /// Hours east of UTC for the reference midnight of the time axis.
    pub utc_offset_hours: i32,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            locations: Location::builtin(),
            models: Model::builtin(),
            variables: Variable::ALL.to_vec(),
            render: ChartConfig::default(),
            cache_path: PathBuf::from("cache.json"),
            plots_dir: PathBuf::from("plots"),
            max_concurrent: 4,
            utc_offset_hours: 0,
        }
    }
}

/// Upstream endpoints and request settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub ensemble_url: String,
    pub referer: String,
    /// Autocomplete endpoint; the search text is sent as `q`.
    pub autocomplete_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ensemble_url: "https://meteologix.com/uk/ajax/ensemble".to_string(),
            referer: "https://meteologix.com/uk/forecast/2867714-munich/ensemble/rapid-id2/precipitation"
                .to_string(),
            autocomplete_url: "https://search.meteologix.com/xx/autocomplete/uk/de".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.12; rv:55.0) Gecko/20100101 Firefox/55.0"
                .to_string(),
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ForecasterConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        info!(
            path = %path.display(),
            locations = config.locations.len(),
            models = config.models.len(),
            variables = config.variables.len(),
            "Loaded forecaster config"
        );
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(content)?;
        if config.locations.is_empty() {
            debug!("No locations configured, using built-in registry");
            config.locations = Location::builtin();
        }
        if config.models.is_empty() {
            debug!("No models configured, using built-in registry");
            config.models = Model::builtin();
        }
        if config.variables.is_empty() {
            config.variables = Variable::ALL.to_vec();
        }
        config.max_concurrent = config.max_concurrent.max(1);
        config.utc_offset()?;
        Ok(config)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("utc_offset_hours out of range: {}", self.utc_offset_hours))
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name.eq_ignore_ascii_case(name))
    }

    /// Look a model up by name or query slug.
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name) || m.slug.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
source:
  timeout_secs: 5
locations:
  - name: munich
    id: 2867714
  - name: berlin
    id: "2950159"
models:
  - name: rapid_id2
    slug: rapid-id2
variables: [temperature, niederschlag]
render:
  width: 800
  height: 400
cache_path: /tmp/forecast-cache.json
max_concurrent: 2
"#;
        let config = ForecasterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.source.timeout(), Duration::from_secs(5));
        assert_eq!(config.source.ensemble_url, SourceConfig::default().ensemble_url);
        assert_eq!(config.locations.len(), 2);
        assert_eq!(config.location("Berlin").map(|l| l.id.as_str()), Some("2950159"));
        assert_eq!(config.location("munich").map(|l| l.id.as_str()), Some("2867714"));
        assert_eq!(config.variables, vec![Variable::Temperature, Variable::Precipitation]);
        assert_eq!(config.render.width, 800);
        assert_eq!(config.render.levels, 11);
        assert_eq!(config.cache_path, PathBuf::from("/tmp/forecast-cache.json"));
        assert_eq!(config.plots_dir, PathBuf::from("plots"));
        assert_eq!(config.max_concurrent, 2);
    }

    #[test]
    fn test_empty_sections_fall_back_to_builtins() {
        let config = ForecasterConfig::from_yaml("locations: []\nmax_concurrent: 0\n").unwrap();
        assert_eq!(config.locations, Location::builtin());
        assert_eq!(config.models, Model::builtin());
        assert_eq!(config.variables.len(), 6);
        assert_eq!(config.max_concurrent, 1);
    }

    #[test]
    fn test_utc_offset() {
        assert_eq!(ForecasterConfig::default().utc_offset().unwrap().local_minus_utc(), 0);
        let config = ForecasterConfig::from_yaml("utc_offset_hours: 1\n").unwrap();
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), 3600);
        assert!(ForecasterConfig::from_yaml("utc_offset_hours: 30\n").is_err());
    }

    #[test]
    fn test_model_lookup_by_slug() {
        let config = ForecasterConfig::default();
        assert!(config.model("rapid-id2").is_some());
        assert!(config.model("RAPID_ID2").is_some());
        assert!(config.model("icon").is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForecasterConfig::load_or_default(&dir.path().join("none.yaml")).unwrap();
        assert_eq!(config.cache_path, PathBuf::from("cache.json"));
    }

    #[test]
    fn test_load_reports_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "variables: [snowfall]\n").unwrap();
        let err = ForecasterConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }
}
