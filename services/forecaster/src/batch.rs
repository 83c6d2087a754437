//! Batch mode: every configured case, plots written to disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use ensemble_common::{Location, Model, Variable};

use crate::pipeline::{Case, Forecaster};

/// Counts from one batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: Vec<PathBuf>,
    pub no_data: usize,
    pub failed: usize,
}

enum Outcome {
    Written(PathBuf),
    NoData,
    Failed,
}

/// Cartesian product of locations, variables and models.
pub fn cases(locations: &[Location], variables: &[Variable], models: &[Model]) -> Vec<Case> {
    let mut cases = Vec::with_capacity(locations.len() * variables.len() * models.len());
    for location in locations {
        for variable in variables {
            for model in models {
                cases.push(Case::new(location.clone(), *variable, model.clone()));
            }
        }
    }
    cases
}

/// Run `cases` with at most `max_concurrent` in flight, write each figure to
/// `plots_dir`, then save the cache once.
pub async fn run_batch(
    forecaster: &Forecaster,
    cases: Vec<Case>,
    plots_dir: &Path,
    max_concurrent: usize,
) -> Result<BatchSummary> {
    tokio::fs::create_dir_all(plots_dir)
        .await
        .with_context(|| format!("Failed to create plots directory: {:?}", plots_dir))?;

    let total = cases.len();
    info!(cases = total, max_concurrent, "Starting batch");

    let outcomes: Vec<Outcome> = stream::iter(cases)
        .map(|case| async move {
            let key = case.key();
            match forecaster.run_case(&case).await {
                Ok(output) => {
                    let path = plots_dir.join(format!("{}.png", case.file_stem()));
                    match tokio::fs::write(&path, &output.figure.png).await {
                        Ok(()) => {
                            info!(case = %key, path = %path.display(), is_new = output.is_new, "Wrote plot");
                            Outcome::Written(path)
                        }
                        Err(e) => {
                            error!(case = %key, path = %path.display(), error = %e, "Failed to write plot");
                            Outcome::Failed
                        }
                    }
                }
                Err(e) if e.is_precondition() => {
                    warn!(case = %key, error = %e, "No data for case, skipping");
                    Outcome::NoData
                }
                Err(e) => {
                    error!(case = %key, error = %e, "Case failed");
                    Outcome::Failed
                }
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Written(path) => summary.written.push(path),
            Outcome::NoData => summary.no_data += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }
    summary.written.sort();

    forecaster.save_cache().await.context("Failed to save cache")?;

    info!(
        total,
        written = summary.written.len(),
        no_data = summary.no_data,
        failed = summary.failed,
        "Batch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use ensemble_common::{EnsembleError, EnsembleResult, LocationCandidate};
    use renderer::ChartConfig;
    use storage::ForecastCache;
    use test_utils::{create_temperature_sample, empty_ensemble_page, ensemble_page, fixture_reference};

    use crate::fetch::PageSource;

    /// Temperature has data, precipitation is empty, anything else fails.
    struct MixedPages;

    #[async_trait]
    impl PageSource for MixedPages {
        async fn fetch_page(&self, _: &Location, variable: Variable, _: &Model) -> EnsembleResult<String> {
            match variable {
                Variable::Temperature => Ok(ensemble_page(&create_temperature_sample(4, 12), fixture_reference())),
                Variable::Precipitation => Ok(empty_ensemble_page()),
                _ => Err(EnsembleError::Upstream("HTTP 503".to_string())),
            }
        }

        async fn search(&self, _: &str) -> EnsembleResult<Vec<LocationCandidate>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_cases_are_cartesian_product() {
        let locations = vec![Location::new("munich", "2867714"), Location::new("berlin", "2950159")];
        let models = vec![Model::new("rapid_id2", "rapid-id2"), Model::new("icon", "icon")];
        let all = cases(&locations, &Variable::ALL, &models);
        assert_eq!(all.len(), 2 * 6 * 2);
        assert_eq!(all[0].location.name, "munich");
        assert_eq!(all[0].variable, Variable::Precipitation);
        assert!(cases(&[], &Variable::ALL, &models).is_empty());
    }

    #[tokio::test]
    async fn test_batch_writes_plots_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache.json");
        let plots = dir.path().join("plots");
        let chart = ChartConfig {
            width: 300,
            height: 200,
            ..ChartConfig::default()
        };
        let forecaster = Forecaster::new(Arc::new(MixedPages), ForecastCache::new(), cache_path.clone(), chart);

        let batch = cases(
            &[Location::new("munich", "2867714")],
            &[Variable::Temperature, Variable::Precipitation, Variable::Pressure],
            &[Model::new("rapid_id2", "rapid-id2")],
        );
        let summary = run_batch(&forecaster, batch, &plots, 2).await.unwrap();

        assert_eq!(summary.written, vec![plots.join("rapid_id2_munich_temperature.png")]);
        assert_eq!(summary.no_data, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.written[0].exists());
        assert!(cache_path.exists());
    }
}
