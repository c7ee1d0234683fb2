use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};

use crate::core::task::id_string;

/// Per-attempt timeout for the `/health` probe.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
/// Per-attempt timeout for a search call.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(6);
/// Delay before each retry attempt; the first attempt is immediate.
pub const RETRY_DELAYS_MS: [u64; 3] = [0, 1000, 2000];

/// One hit from the semantic-search endpoint. The id points back at
/// the full source record; `content` is a preview, not the record.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: f64,
    pub content: String,
    pub timestamp: Option<String>,
}

/// Minimal HTTP client for the Second Brain API.
#[derive(Clone)]
pub struct BrainClient {
    base_url: String,
    http: Client,
}

impl BrainClient {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let http = Client::builder()
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Single health probe, bounded by [`HEALTH_TIMEOUT`]. A timed-out
    /// request reports like any other failed request.
    pub async fn health_once(&self) -> Result<Value, String> {
        let url = format!("{}/health", self.base_url);
        let resp = match tokio::time::timeout(HEALTH_TIMEOUT, self.http.get(&url).send()).await {
            Err(_) => return Err("health check timed out".to_string()),
            Ok(Err(e)) => return Err(format!("health request failed: {}", e)),
            Ok(Ok(resp)) => resp,
        };
        if !resp.status().is_success() {
            return Err(format!("health returned HTTP {}", resp.status()));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| format!("failed to parse health response: {}", e))
    }

    /// Health probe with the standard backoff schedule. Used by the
    /// data service when it brings all sources up together.
    pub async fn health_with_retry(&self) -> Result<Value, String> {
        for (attempt, delay) in RETRY_DELAYS_MS.iter().enumerate() {
            if *delay > 0 {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }
            match self.health_once().await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    if attempt + 1 < RETRY_DELAYS_MS.len() {
                        log::info!(
                            "brain health check attempt {} failed ({}), retrying...",
                            attempt + 1,
                            e
                        );
                    }
                }
            }
        }
        Err(format!(
            "API unreachable after {} attempts",
            RETRY_DELAYS_MS.len()
        ))
    }

    /// Single search attempt, bounded by [`SEARCH_TIMEOUT`]. Retry
    /// policy lives in the store, not here.
    pub async fn search_once(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, String> {
        let url = format!("{}/api/search", self.base_url);
        let body = json!({ "query": query, "limit": limit });

        let send = self.http.post(&url).json(&body).send();
        let resp = match tokio::time::timeout(SEARCH_TIMEOUT, send).await {
            Err(_) => return Err("search timed out".to_string()),
            Ok(Err(e)) => return Err(format!("search request failed: {}", e)),
            Ok(Ok(resp)) => resp,
        };
        if !resp.status().is_success() {
            return Err(format!("search returned HTTP {}", resp.status()));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| format!("failed to parse search response: {}", e))?;
        Ok(parse_results(&data))
    }
}

/// Pull well-formed hits out of a search response, skipping anything
/// missing its id or score.
fn parse_results(data: &Value) -> Vec<SearchResult> {
    let Some(items) = data.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    items.iter().filter_map(parse_result).collect()
}

fn parse_result(v: &Value) -> Option<SearchResult> {
    let id = v.get("id").and_then(id_string)?;
    let score = v.get("score").and_then(Value::as_f64)?;
    let content = ["content", "message", "text", "preview"]
        .iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .unwrap_or("")
        .to_string();
    let timestamp = v
        .get("timestamp")
        .and_then(Value::as_str)
        .map(|s| s.to_string());
    Some(SearchResult {
        id,
        score,
        content,
        timestamp,
    })
}
