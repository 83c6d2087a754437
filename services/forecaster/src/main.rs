//! Ensemble probability forecaster.
//!
//! Turns ensemble forecast pages into exceedance-probability charts:
//! - `run`: every configured location x variable x model, plots written to disk
//! - `search`: look up location ids by name
//! - `serve`: HTTP viewer and JSON API over the same pipeline
//!
//! Results are memoized in a JSON cache keyed by page content, so an
//! unchanged upstream page is never parsed or rendered twice.

mod batch;
mod config;
mod fetch;
mod pipeline;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ensemble_common::Variable;
use storage::ForecastCache;

use config::ForecasterConfig;
use fetch::EnsembleClient;
use pipeline::Forecaster;
use server::ServerState;

#[derive(Parser, Debug)]
#[command(name = "forecaster")]
#[command(about = "Ensemble forecast probability charts")]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "FORECASTER_CONFIG", default_value = "config/forecaster.yaml", global = true)]
    config: PathBuf,

    /// Cache file (overrides the config file)
    #[arg(long, env = "FORECASTER_CACHE", global = true)]
    cache: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every configured case and write plots
    Run {
        /// Directory for plots (overrides the config file)
        #[arg(long)]
        plots_dir: Option<PathBuf>,

        /// Only this variable (name or upstream slug)
        #[arg(long)]
        variable: Option<Variable>,

        /// Maximum concurrent cases (overrides the config file)
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
    /// Search locations by name
    Search {
        /// Location name or prefix
        name: String,
    },
    /// Serve the viewer and API
    Serve {
        /// HTTP port
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs)?;

    let mut config = ForecasterConfig::load_or_default(&args.config)?;
    if let Some(cache) = &args.cache {
        config.cache_path = cache.clone();
    }

    let client = EnsembleClient::new(config.source.clone())?;

    match args.command {
        Command::Search { name } => {
            let candidates = client
                .search_locations(&name)
                .await
                .with_context(|| format!("Location search for '{}' failed", name))?;
            if candidates.is_empty() {
                println!("No locations found for '{}'", name);
            }
            for candidate in candidates {
                println!("{} -> {}", candidate.display_name(), candidate.id);
            }
        }
        Command::Run {
            plots_dir,
            variable,
            max_concurrent,
        } => {
            if let Some(dir) = plots_dir {
                config.plots_dir = dir;
            }
            if let Some(variable) = variable {
                config.variables = vec![variable];
            }
            let max_concurrent = max_concurrent.unwrap_or(config.max_concurrent);

            let forecaster = open_forecaster(&config, client).await?;
            let cases = batch::cases(&config.locations, &config.variables, &config.models);
            let summary = batch::run_batch(&forecaster, cases, &config.plots_dir, max_concurrent).await?;

            let stats = forecaster.cache_stats().await;
            info!(
                written = summary.written.len(),
                no_data = summary.no_data,
                failed = summary.failed,
                raw_samples = stats.raw_samples,
                surfaces = stats.surfaces,
                "Run complete"
            );
            if summary.failed > 0 {
                anyhow::bail!("{} case(s) failed", summary.failed);
            }
        }
        Command::Serve { port } => {
            // Initialize Prometheus metrics exporter
            let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .context("Failed to install Prometheus recorder")?;

            let forecaster = open_forecaster(&config, client).await?;
            let state = Arc::new(ServerState {
                forecaster,
                config,
                prometheus,
            });
            server::run_server(state, port).await?;
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn open_forecaster(config: &ForecasterConfig, client: EnsembleClient) -> Result<Forecaster> {
    let cache = ForecastCache::load_or_default(&config.cache_path)
        .await
        .with_context(|| format!("Failed to open cache {:?}", config.cache_path))?;

    Ok(Forecaster::new(
        Arc::new(client),
        cache,
        config.cache_path.clone(),
        config.render.clone(),
    )
    .with_utc_offset(config.utc_offset()?))
}
