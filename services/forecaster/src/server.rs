//! HTTP viewer and JSON API.
//!
//! Provides endpoints for:
//! - An interactive page (location search, variable and model selectors)
//! - The catalog of configured locations, models and variables
//! - Location autocomplete
//! - Rendered plots (PNG) and probability surfaces (JSON)
//! - Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use ensemble_common::{EnsembleError, Location, Model, Variable};

use crate::config::ForecasterConfig;
use crate::pipeline::{Case, CaseOutput, Forecaster};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CatalogResponse {
    pub locations: Vec<Location>,
    pub models: Vec<Model>,
    pub variables: Vec<VariableInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableInfo {
    pub name: &'static str,
    pub slug: &'static str,
    pub units: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationOption {
    pub display_name: String,
    pub label: String,
    pub country: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbabilitiesResponse {
    pub case: String,
    pub variable: Variable,
    pub units: &'static str,
    pub times: Vec<i64>,
    pub thresholds: Vec<f64>,
    /// Row-major by time: `values[t * thresholds.len() + s]`
    pub values: Vec<f64>,
    pub is_new: bool,
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Case selection. `location_id` takes precedence over a registry lookup of
/// `location`; omitted location and model fall back to the first configured.
#[derive(Debug, Default, Deserialize)]
pub struct CaseQuery {
    pub location: Option<String>,
    pub location_id: Option<String>,
    pub variable: Option<String>,
    pub model: Option<String>,
}

// ============================================================================
// Shared State
// ============================================================================

pub struct ServerState {
    pub forecaster: Forecaster,
    pub config: ForecasterConfig,
    pub prometheus: PrometheusHandle,
}

/// Error wrapper mapping pipeline failures onto HTTP responses.
pub struct ApiError(EnsembleError);

impl From<EnsembleError> for ApiError {
    fn from(err: EnsembleError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = if self.0.is_precondition() {
            warn!(error = %self.0, "No data for requested case");
            json!({ "warning": self.0.to_string() })
        } else {
            error!(error = %self.0, "Request failed");
            json!({ "error": self.0.to_string() })
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the viewer and API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/catalog", get(catalog_handler))
        .route("/api/locations", get(locations_handler))
        .route("/api/plot", get(plot_handler))
        .route("/api/probabilities", get(probabilities_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting forecaster server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - Interactive viewer
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health - Liveness plus cache size
async fn health_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let stats = state.forecaster.cache_stats().await;
    Json(json!({ "status": "ok", "cache": stats }))
}

/// GET /api/catalog - Configured registries
async fn catalog_handler(Extension(state): Extension<Arc<ServerState>>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        locations: state.config.locations.clone(),
        models: state.config.models.clone(),
        variables: Variable::ALL
            .iter()
            .map(|v| VariableInfo {
                name: v.name(),
                slug: v.slug(),
                units: v.units(),
            })
            .collect(),
    })
}

/// GET /api/locations?q= - Location autocomplete
async fn locations_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<LocationOption>>, ApiError> {
    let name = query.q.unwrap_or_default();
    if name.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }

    let candidates = state.forecaster.source().search(name.trim()).await?;
    Ok(Json(
        candidates
            .into_iter()
            .map(|c| LocationOption {
                display_name: c.display_name(),
                label: c.label,
                country: c.country,
                id: c.id,
            })
            .collect(),
    ))
}

/// GET /api/plot - Rendered chart for one case
async fn plot_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(query): Query<CaseQuery>,
) -> Result<Response, ApiError> {
    let output = run_requested_case(&state, &query).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        output.figure.png,
    )
        .into_response())
}

/// GET /api/probabilities - Probability surface for one case
async fn probabilities_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(query): Query<CaseQuery>,
) -> Result<Json<ProbabilitiesResponse>, ApiError> {
    let output = run_requested_case(&state, &query).await?;
    let surface = output.surface;
    Ok(Json(ProbabilitiesResponse {
        case: output.key.to_string(),
        variable: surface.variable,
        units: surface.variable.units(),
        times: surface.times,
        thresholds: surface.thresholds,
        values: surface.values,
        is_new: output.is_new,
    }))
}

/// GET /metrics - Prometheus text format
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
}

// ============================================================================
// Helpers
// ============================================================================

async fn run_requested_case(state: &ServerState, query: &CaseQuery) -> Result<CaseOutput, ApiError> {
    let case = resolve_case(&state.config, query)?;
    let output = state.forecaster.run_case(&case).await?;

    if output.computed {
        // Keep the on-disk cache current; a failed save does not fail the request.
        if let Err(e) = state.forecaster.save_cache().await {
            error!(error = %e, "Failed to save cache");
        }
    }
    Ok(output)
}

/// Turn query parameters into a case against the configured registries.
pub fn resolve_case(config: &ForecasterConfig, query: &CaseQuery) -> Result<Case, EnsembleError> {
    let variable: Variable = query
        .variable
        .as_deref()
        .ok_or_else(|| EnsembleError::MissingParameter("variable".to_string()))?
        .parse()?;

    let location = match (non_empty(&query.location_id), non_empty(&query.location)) {
        (Some(id), name) => Location::new(name.unwrap_or(id), id),
        (None, Some(name)) => config
            .location(name)
            .cloned()
            .ok_or_else(|| EnsembleError::UnknownLocation(name.to_string()))?,
        (None, None) => config
            .locations
            .first()
            .cloned()
            .ok_or_else(|| EnsembleError::MissingParameter("location".to_string()))?,
    };

    let model = match non_empty(&query.model) {
        Some(name) => config
            .model(name)
            .cloned()
            .ok_or_else(|| EnsembleError::UnknownModel(name.to_string()))?,
        None => config
            .models
            .first()
            .cloned()
            .ok_or_else(|| EnsembleError::MissingParameter("model".to_string()))?,
    };

    Ok(Case::new(location, variable, model))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Ensemble Probability Forecast</title>
<style>
  body { font-family: sans-serif; margin: 0; display: flex; }
  aside { width: 260px; padding: 16px; background: #f0f4f8; min-height: 100vh; }
  main { padding: 16px; flex: 1; }
  label { display: block; margin-top: 12px; font-weight: bold; }
  input, select, button { width: 100%; margin-top: 4px; }
  #warning { color: #8a6d3b; background: #fcf8e3; padding: 8px; display: none; }
  img { max-width: 100%; }
</style>
</head>
<body>
<aside>
  <h2>Variable and place</h2>
  <label for="search">Search</label>
  <input id="search" value="Munic">
  <label for="options">Options</label>
  <select id="options"></select>
  <label for="variable">Variable</label>
  <select id="variable"></select>
  <label for="model">Model</label>
  <select id="model"></select>
  <button id="show">Show</button>
</aside>
<main>
  <h1 id="title">Ensemble Probability Forecast</h1>
  <div id="warning"></div>
  <img id="plot" alt="">
</main>
<script>
const $ = (id) => document.getElementById(id);

async function loadCatalog() {
  const catalog = await (await fetch('/api/catalog')).json();
  $('variable').innerHTML = catalog.variables
    .map(v => `<option value="${v.name}">${v.name} (${v.units})</option>`).join('');
  $('model').innerHTML = catalog.models
    .map(m => `<option value="${m.name}">${m.name}</option>`).join('');
  $('options').innerHTML = catalog.locations
    .map(l => `<option value="${l.id}" data-label="${l.name}">${l.name}</option>`).join('');
}

async function search() {
  const q = $('search').value.trim();
  if (!q) return;
  const results = await (await fetch('/api/locations?q=' + encodeURIComponent(q))).json();
  if (results.length) {
    $('options').innerHTML = results
      .map(r => `<option value="${r.id}" data-label="${r.label}">${r.display_name}</option>`).join('');
  }
}

async function show() {
  const option = $('options').selectedOptions[0];
  if (!option) return;
  const params = new URLSearchParams({
    location: option.dataset.label,
    location_id: option.value,
    variable: $('variable').value,
    model: $('model').value,
  });
  $('title').textContent = $('variable').value + ' - ' + option.textContent;
  $('warning').style.display = 'none';
  const response = await fetch('/api/plot?' + params);
  if (!response.ok) {
    const body = await response.json();
    $('warning').textContent = body.warning || body.error;
    $('warning').style.display = 'block';
    $('plot').removeAttribute('src');
    return;
  }
  $('plot').src = URL.createObjectURL(await response.blob());
}

$('search').addEventListener('change', search);
$('show').addEventListener('click', show);
loadCatalog().then(search);
</script>
</body>
</html>
"#;
