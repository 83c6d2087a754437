//! Per-case pipeline: fetch, parse, transform, render, memoize.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use ensemble_common::{
    reference_midnight_at, CaseKey, EnsembleError, EnsembleResult, EnsembleSample, Figure, Location, Model,
    ProbabilitySurface, Variable,
};
use ensemble_parser::parse_ensemble_page;
use probability::{convert_to_probabilities, ensemble_mean, member_series};
use renderer::{ChartConfig, ProbabilityChart};
use storage::{content_hash, CacheStats, ForecastCache};

use crate::fetch::PageSource;

/// Member drawn as the deterministic run.
const DETERMINISTIC_MEMBER: &str = "Main";

/// One (location, variable, model) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub location: Location,
    pub variable: Variable,
    pub model: Model,
}

impl Case {
    pub fn new(location: Location, variable: Variable, model: Model) -> Self {
        Self {
            location,
            variable,
            model,
        }
    }

    pub fn key(&self) -> CaseKey {
        CaseKey::new(&self.location, self.variable, &self.model)
    }

    /// Plot file stem: `{model}_{location}_{variable}`.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.model.name,
            self.location.file_label(),
            self.variable.name()
        )
    }
}

/// Result of running one case.
#[derive(Debug, Clone)]
pub struct CaseOutput {
    pub key: CaseKey,
    pub surface: ProbabilitySurface,
    pub figure: Figure,
    /// The page content had not been seen before.
    pub is_new: bool,
    /// Surface and figure were computed in this run rather than reused.
    pub computed: bool,
}

/// Runs cases against a page source and a shared memo cache.
pub struct Forecaster {
    source: Arc<dyn PageSource>,
    cache: Mutex<ForecastCache>,
    cache_path: PathBuf,
    chart: Arc<ChartConfig>,
    /// Offset of the day boundary used for hour offsets.
    utc_offset: FixedOffset,
}

impl Forecaster {
    pub fn new(source: Arc<dyn PageSource>, cache: ForecastCache, cache_path: PathBuf, chart: ChartConfig) -> Self {
        Self {
            source,
            cache: Mutex::new(cache),
            cache_path,
            chart: Arc::new(chart),
            utc_offset: Utc.fix(),
        }
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn source(&self) -> &Arc<dyn PageSource> {
        &self.source
    }

    /// Download the page for `case` and return its sample, parsing only when
    /// the page content is new.
    #[instrument(skip_all, fields(case = %case.key()))]
    pub async fn get_data(&self, case: &Case) -> EnsembleResult<(bool, EnsembleSample)> {
        let (_, is_new, sample) = self.fetch_sample(case).await?;
        Ok((is_new, sample))
    }

    async fn fetch_sample(&self, case: &Case) -> EnsembleResult<(String, bool, EnsembleSample)> {
        let page = self
            .source
            .fetch_page(&case.location, case.variable, &case.model)
            .await?;
        let hash = content_hash(&page);

        if let Some(sample) = self.cache.lock().await.raw_sample(&hash) {
            counter!("forecaster_cache_hits_total").increment(1);
            debug!(hash = %hash, "Page content already parsed");
            return Ok((hash, false, sample.clone()));
        }
        counter!("forecaster_cache_misses_total").increment(1);

        let reference = reference_midnight_at(Utc::now(), self.utc_offset);
        let sample = tokio::task::spawn_blocking(move || parse_ensemble_page(&page, reference))
            .await
            .map_err(|e| EnsembleError::InternalError(format!("Parse task failed: {}", e)))??;

        info!(
            hash = %hash,
            members = sample.member_count(),
            times = sample.time_count(),
            "Parsed new ensemble sample"
        );
        self.cache.lock().await.insert_raw(hash.clone(), sample.clone());
        Ok((hash, true, sample))
    }

    /// Produce the surface and figure for `case`, reusing cached results
    /// when they were computed from the same page content.
    #[instrument(skip_all, fields(case = %case.key()))]
    pub async fn run_case(&self, case: &Case) -> EnsembleResult<CaseOutput> {
        counter!("forecaster_cases_total", "variable" => case.variable.name()).increment(1);

        let (hash, is_new, sample) = match self.fetch_sample(case).await {
            Ok(data) => data,
            Err(e) => {
                if e.is_precondition() {
                    counter!("forecaster_no_data_total").increment(1);
                }
                return Err(e);
            }
        };
        let key = case.key();

        {
            let cache = self.cache.lock().await;
            if cache.source_hash(&key) == Some(hash.as_str()) {
                if let (Some(surface), Some(figure)) = (cache.surface(&key), cache.figure(&key)) {
                    debug!("Reusing cached surface and figure");
                    return Ok(CaseOutput {
                        key,
                        surface: surface.clone(),
                        figure: figure.clone(),
                        is_new,
                        computed: false,
                    });
                }
            }
        }

        let variable = case.variable;
        let chart = Arc::clone(&self.chart);
        let now = Utc::now();
        let reference = reference_midnight_at(now, self.utc_offset);
        let (surface, figure) = tokio::task::spawn_blocking(move || compute(&sample, variable, &chart, now, reference))
            .await
            .map_err(|e| EnsembleError::InternalError(format!("Render task failed: {}", e)))??;

        {
            let mut cache = self.cache.lock().await;
            cache.insert_surface(&key, surface.clone());
            cache.insert_figure(&key, figure.clone());
            cache.set_source_hash(&key, hash);
        }
        info!(bytes = figure.png.len(), "Computed probability chart");

        Ok(CaseOutput {
            key,
            surface,
            figure,
            is_new,
            computed: true,
        })
    }

    /// Write the whole cache to its file.
    pub async fn save_cache(&self) -> EnsembleResult<()> {
        let snapshot = self.cache.lock().await.clone();
        let bytes = tokio::task::spawn_blocking(move || snapshot.encode())
            .await
            .map_err(|e| EnsembleError::InternalError(format!("Cache encode task failed: {}", e)))??;
        ForecastCache::write_encoded(&self.cache_path, &bytes).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }
}

/// Transform and render; CPU-bound, run off the async workers.
fn compute(
    sample: &EnsembleSample,
    variable: Variable,
    chart: &ChartConfig,
    now: DateTime<Utc>,
    reference: DateTime<Utc>,
) -> EnsembleResult<(ProbabilitySurface, Figure)> {
    let surface = convert_to_probabilities(sample, variable)?;
    let mean = ensemble_mean(sample);
    let now_hour = (now - reference).num_seconds() as f64 / 3600.0;

    let mut plot = ProbabilityChart::new(&surface, chart)
        .with_mean(&mean)
        .with_now_marker(now_hour);
    if let Some(main) = member_series(sample, DETERMINISTIC_MEMBER) {
        plot = plot.with_deterministic(main);
    }
    let figure = plot.render()?;
    Ok((surface, figure))
}
