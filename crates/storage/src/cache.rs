//! On-disk memo cache for samples, surfaces and figures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ensemble_common::{CaseKey, EnsembleError, EnsembleResult, EnsembleSample, Figure, ProbabilitySurface};

/// Memoized pipeline results.
///
/// Entries never expire; a changed page body produces a new content hash and
/// therefore a new raw entry, while the surface and figure for a case are
/// overwritten when recomputed. Each case also records the content hash its
/// surface was computed from.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ForecastCache {
    /// Content hash of the page text -> parsed sample
    #[serde(default)]
    raw_data: HashMap<String, EnsembleSample>,
    /// `location_id:variable:model` -> probability surface
    #[serde(default)]
    probabilities: HashMap<String, ProbabilitySurface>,
    /// `location_id:variable:model` -> rendered chart
    #[serde(default)]
    figures: HashMap<String, Figure>,
    /// `location_id:variable:model` -> content hash behind the surface
    #[serde(default)]
    sources: HashMap<String, String>,
}

/// Entry counts per table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub raw_samples: usize,
    pub surfaces: usize,
    pub figures: usize,
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file.
    pub async fn load(path: impl AsRef<Path>) -> EnsembleResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            EnsembleError::CacheError(format!("Failed to read cache {}: {}", path.display(), e))
        })?;
        let cache: Self = serde_json::from_slice(&bytes).map_err(|e| {
            EnsembleError::CacheError(format!("Failed to decode cache {}: {}", path.display(), e))
        })?;

        info!(
            path = %path.display(),
            raw_samples = cache.raw_data.len(),
            surfaces = cache.probabilities.len(),
            figures = cache.figures.len(),
            "Loaded forecast cache"
        );
        Ok(cache)
    }

    /// Load a cache file, or start empty when it does not exist yet.
    pub async fn load_or_default(path: impl AsRef<Path>) -> EnsembleResult<Self> {
        let path = path.as_ref();
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => {
                info!(path = %path.display(), "No cache file yet, starting empty");
                Ok(Self::default())
            }
            Err(e) => Err(EnsembleError::CacheError(format!(
                "Failed to stat cache {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Write the cache atomically: a sibling temp file renamed over `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> EnsembleResult<()> {
        let bytes = self.encode()?;
        Self::write_encoded(path, &bytes).await
    }

    /// Serialize to the on-disk JSON form.
    pub fn encode(&self) -> EnsembleResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| EnsembleError::CacheError(format!("Failed to encode cache: {}", e)))
    }

    /// Atomically replace `path` with already encoded cache bytes.
    pub async fn write_encoded(path: impl AsRef<Path>, bytes: &[u8]) -> EnsembleResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EnsembleError::CacheError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            EnsembleError::CacheError(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            EnsembleError::CacheError(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), bytes = bytes.len(), "Saved forecast cache");
        Ok(())
    }

    pub fn raw_sample(&self, hash: &str) -> Option<&EnsembleSample> {
        self.raw_data.get(hash)
    }

    pub fn insert_raw(&mut self, hash: impl Into<String>, sample: EnsembleSample) {
        self.raw_data.insert(hash.into(), sample);
    }

    pub fn surface(&self, key: &CaseKey) -> Option<&ProbabilitySurface> {
        self.probabilities.get(&key.to_string())
    }

    pub fn insert_surface(&mut self, key: &CaseKey, surface: ProbabilitySurface) {
        self.probabilities.insert(key.to_string(), surface);
    }

    pub fn figure(&self, key: &CaseKey) -> Option<&Figure> {
        self.figures.get(&key.to_string())
    }

    pub fn insert_figure(&mut self, key: &CaseKey, figure: Figure) {
        self.figures.insert(key.to_string(), figure);
    }

    /// Content hash the cached surface for `key` was computed from.
    pub fn source_hash(&self, key: &CaseKey) -> Option<&str> {
        self.sources.get(&key.to_string()).map(String::as_str)
    }

    pub fn set_source_hash(&mut self, key: &CaseKey, hash: impl Into<String>) {
        self.sources.insert(key.to_string(), hash.into());
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            raw_samples: self.raw_data.len(),
            surfaces: self.probabilities.len(),
            figures: self.figures.len(),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache".into());
    name.push(".tmp");
    path.with_file_name(name)
}
