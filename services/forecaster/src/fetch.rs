//! HTTP client for the upstream ensemble and autocomplete endpoints.
//!
//! One attempt per call; failures surface as `EnsembleError::Upstream`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use ensemble_common::{EnsembleError, EnsembleResult, Location, LocationCandidate, Model, Variable};

use crate::config::SourceConfig;

/// Anything that can produce ensemble pages and location candidates.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Page body for one (location, variable, model) case.
    async fn fetch_page(&self, location: &Location, variable: Variable, model: &Model) -> EnsembleResult<String>;

    /// Locations matching a free-text name.
    async fn search(&self, name: &str) -> EnsembleResult<Vec<LocationCandidate>>;
}

/// Client for the ensemble forecast pages.
#[derive(Clone)]
pub struct EnsembleClient {
    client: Client,
    source: SourceConfig,
}

impl EnsembleClient {
    pub fn new(source: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(source.timeout())
            .user_agent(source.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, source })
    }

    /// Fetch the ensemble page for one case and return its body.
    #[instrument(skip_all, fields(location = %location.name, variable = %variable, model = %model.name))]
    pub async fn download_page(
        &self,
        location: &Location,
        variable: Variable,
        model: &Model,
    ) -> EnsembleResult<String> {
        let response = self
            .client
            .get(&self.source.ensemble_url)
            .header(header::REFERER, &self.source.referer)
            .query(&[
                ("city_id", location.id.as_str()),
                ("model", model.slug.as_str()),
                ("model_view", ""),
                ("param", variable.slug()),
            ])
            .send()
            .await
            .map_err(|e| EnsembleError::Upstream(format!("Ensemble request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnsembleError::Upstream(format!(
                "Ensemble endpoint returned HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EnsembleError::Upstream(format!("Failed to read ensemble page: {}", e)))?;
        debug!(bytes = body.len(), "Downloaded ensemble page");
        Ok(body)
    }

    /// Autocomplete lookup; anything but a JSON array yields no candidates.
    #[instrument(skip(self))]
    pub async fn search_locations(&self, name: &str) -> EnsembleResult<Vec<LocationCandidate>> {
        let response = self
            .client
            .get(&self.source.autocomplete_url)
            .query(&[("q", name)])
            .send()
            .await
            .map_err(|e| EnsembleError::Upstream(format!("Location search failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnsembleError::Upstream(format!(
                "Autocomplete endpoint returned HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EnsembleError::Upstream(format!("Failed to read search results: {}", e)))?;
        let value: Value = serde_json::from_str(&body)?;
        Ok(parse_candidates(value))
    }
}

#[async_trait]
impl PageSource for EnsembleClient {
    async fn fetch_page(&self, location: &Location, variable: Variable, model: &Model) -> EnsembleResult<String> {
        self.download_page(location, variable, model).await
    }

    async fn search(&self, name: &str) -> EnsembleResult<Vec<LocationCandidate>> {
        self.search_locations(name).await
    }
}

/// Candidates from an autocomplete response. Entries without a label or id
/// are skipped.
pub fn parse_candidates(value: Value) -> Vec<LocationCandidate> {
    let Value::Array(entries) = value else {
        debug!("Autocomplete response is not a list");
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<LocationCandidate>(entry) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!(error = %e, "Skipping malformed autocomplete entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::routing::get;
    use axum::{Extension, Json, Router};
    use serde_json::json;

    /// One request as seen by the local upstream.
    #[derive(Debug, Clone)]
    struct Seen {
        path: String,
        query: HashMap<String, String>,
        referer: Option<String>,
        user_agent: Option<String>,
    }

    type RequestLog = Arc<Mutex<Vec<Seen>>>;

    fn record(log: &RequestLog, uri: &Uri, query: HashMap<String, String>, headers: &HeaderMap) {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
        log.lock().unwrap().push(Seen {
            path: uri.path().to_string(),
            query,
            referer: text("referer"),
            user_agent: text("user-agent"),
        });
    }

    async fn ensemble(
        Extension(log): Extension<RequestLog>,
        uri: Uri,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> &'static str {
        record(&log, &uri, query, &headers);
        "<html>ensemble page</html>"
    }

    async fn autocomplete(
        Extension(log): Extension<RequestLog>,
        uri: Uri,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Json<Value> {
        record(&log, &uri, query, &headers);
        Json(json!([{"label": "Munich", "country": "Germany", "id": 2867714}]))
    }

    /// Serve a stand-in upstream on an ephemeral port.
    async fn spawn_upstream() -> (String, RequestLog) {
        let log = RequestLog::default();
        let app = Router::new()
            .route("/ensemble", get(ensemble))
            .route("/autocomplete", get(autocomplete))
            .route("/broken", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }))
            .route("/not-a-list", get(|| async { Json(json!({"error": "rate limited"})) }))
            .layer(Extension(log.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), log)
    }

    fn source(base: &str, ensemble_path: &str, autocomplete_path: &str) -> SourceConfig {
        SourceConfig {
            ensemble_url: format!("{}{}", base, ensemble_path),
            referer: "https://example.test/forecast/2867714-munich/ensemble".to_string(),
            autocomplete_url: format!("{}{}", base, autocomplete_path),
            user_agent: "forecaster-test/1.0".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_download_page_request_shape() {
        let (base, log) = spawn_upstream().await;
        let client = EnsembleClient::new(source(&base, "/ensemble", "/autocomplete")).unwrap();

        let body = client
            .download_page(
                &Location::new("munich", "2867714"),
                Variable::Temperature,
                &Model::new("rapid_id2", "rapid-id2"),
            )
            .await
            .unwrap();
        assert_eq!(body, "<html>ensemble page</html>");

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/ensemble");
        let expected: HashMap<String, String> = [
            ("city_id", "2867714"),
            ("model", "rapid-id2"),
            ("model_view", ""),
            ("param", "temperatur"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(seen[0].query, expected);
        assert_eq!(
            seen[0].referer.as_deref(),
            Some("https://example.test/forecast/2867714-munich/ensemble")
        );
        assert_eq!(seen[0].user_agent.as_deref(), Some("forecaster-test/1.0"));
    }

    #[tokio::test]
    async fn test_search_sends_name_as_q() {
        let (base, log) = spawn_upstream().await;
        let client = EnsembleClient::new(source(&base, "/ensemble", "/autocomplete")).unwrap();

        let candidates = client.search("Munich").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "2867714");

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/autocomplete");
        assert_eq!(seen[0].query.get("q").map(String::as_str), Some("Munich"));
        assert_eq!(seen[0].query.len(), 1);
        assert_eq!(seen[0].user_agent.as_deref(), Some("forecaster-test/1.0"));
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let (base, _) = spawn_upstream().await;
        let client = EnsembleClient::new(source(&base, "/broken", "/broken")).unwrap();

        let err = client
            .fetch_page(
                &Location::new("munich", "2867714"),
                Variable::Pressure,
                &Model::new("rapid_id2", "rapid-id2"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EnsembleError::Upstream(ref m) if m.contains("503")));
        assert!(!err.is_precondition());

        let err = client.search_locations("Munich").await.unwrap_err();
        assert!(matches!(err, EnsembleError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_search_non_list_response_is_empty() {
        let (base, _) = spawn_upstream().await;
        let client = EnsembleClient::new(source(&base, "/ensemble", "/not-a-list")).unwrap();
        assert!(client.search_locations("Munich").await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_candidates() {
        let value = json!([
            {"label": "Munich", "country": "Germany", "id": 2867714, "type": "city"},
            {"label": "Munich", "country": "United States", "id": "5038108"},
            {"country": "Nowhere"}
        ]);
        let candidates = parse_candidates(value);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].display_name(), "Munich, Germany");
        assert_eq!(candidates[0].id, "2867714");
        assert_eq!(candidates[1].to_location(), Location::new("Munich", "5038108"));
    }

    #[test]
    fn test_non_list_response_is_empty() {
        assert!(parse_candidates(json!({"error": "rate limited"})).is_empty());
        assert!(parse_candidates(json!(null)).is_empty());
    }

    #[test]
    fn test_client_builds_from_defaults() {
        assert!(EnsembleClient::new(SourceConfig::default()).is_ok());
    }
}
