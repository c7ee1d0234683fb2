use std::time::Duration;

use chrono::NaiveDateTime;

use super::brain::{BrainClient, SearchResult, RETRY_DELAYS_MS};
use super::{ConnectionStatus, DataService, Source};
use crate::core::time;

/// Outcome of a search call. An empty result list with no error is a
/// valid "zero matches" answer; failure is always a separate signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub error: Option<String>,
}

impl SearchOutcome {
    fn ok(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Second Brain connection state plus the search entry point. The
/// connection state is ephemeral — recomputed on every probe or
/// search, never persisted.
pub struct BrainStore {
    client: BrainClient,
    status: ConnectionStatus,
    last_checked: Option<NaiveDateTime>,
    error: Option<String>,
}

impl BrainStore {
    pub fn new(client: BrainClient) -> Self {
        Self {
            client,
            status: ConnectionStatus::Disconnected,
            last_checked: None,
            error: None,
        }
    }

    /// Adopt the data service's view of the brain source.
    pub fn load(&mut self, service: &DataService) {
        self.status = service.get_status(Source::Brain);
        self.last_checked = Some(time::now());

        if self.status == ConnectionStatus::Connected {
            self.error = None;
            log::info!("second brain online");
        } else {
            self.error = Some("API unreachable".to_string());
            log::info!("second brain offline — semantic search unavailable");
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_online(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn last_checked(&self) -> Option<NaiveDateTime> {
        self.last_checked
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Single-attempt probe used to flip status without searching.
    pub async fn health_check(&mut self) -> bool {
        self.status = ConnectionStatus::Loading;
        match self.client.health_once().await {
            Ok(_) => {
                self.status = ConnectionStatus::Connected;
                self.error = None;
                self.last_checked = Some(time::now());
                log::info!("brain health check passed");
                true
            }
            Err(e) => {
                self.status = ConnectionStatus::Disconnected;
                self.error = Some("API unreachable".to_string());
                self.last_checked = Some(time::now());
                log::info!("brain health check failed: {}", e);
                false
            }
        }
    }

    /// Search with up to three sequential attempts. A known-dead
    /// connection short-circuits without touching the network; a
    /// success at any attempt returns immediately and marks the
    /// connection good again.
    pub async fn search(&mut self, query: &str, limit: usize) -> SearchOutcome {
        let query = query.trim();
        if query.is_empty() {
            return SearchOutcome::ok(Vec::new());
        }

        if self.status == ConnectionStatus::Disconnected {
            return SearchOutcome::failed(
                "Second Brain is offline. Check that the API is running.",
            );
        }

        for (attempt, delay) in RETRY_DELAYS_MS.iter().enumerate() {
            if *delay > 0 {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
                log::info!("search retry attempt {}", attempt + 1);
            }

            match self.client.search_once(query, limit).await {
                Ok(results) => {
                    self.status = ConnectionStatus::Connected;
                    self.error = None;
                    log::info!("search returned {} results for \"{}\"", results.len(), query);
                    return SearchOutcome::ok(results);
                }
                Err(e) => {
                    log::debug!("search attempt {} failed: {}", attempt + 1, e);
                }
            }
        }

        self.status = ConnectionStatus::Disconnected;
        self.error = Some("API unreachable during search".to_string());
        log::warn!("search failed after {} attempts", RETRY_DELAYS_MS.len());
        SearchOutcome::failed("Search failed — Second Brain API is not responding.")
    }

    /// Re-probe through the data service and adopt the result.
    pub async fn retry_connection(&mut self, service: &mut DataService) -> bool {
        log::info!("retrying brain connection...");
        service.refresh(Source::Brain).await;
        self.load(service);
        self.is_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testutil;

    fn store_at(base_url: &str) -> BrainStore {
        BrainStore::new(BrainClient::new(base_url).unwrap())
    }

    #[tokio::test]
    async fn disconnected_search_short_circuits() {
        // Dead port: any network attempt would error, but none is made,
        // so the call returns without burning the retry schedule.
        let mut store = store_at("http://127.0.0.1:9");
        assert_eq!(store.status(), ConnectionStatus::Disconnected);

        let started = std::time::Instant::now();
        let outcome = store.search("launch window", 10).await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(outcome.results.is_empty());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn empty_query_is_a_valid_empty_answer() {
        let mut store = store_at("http://127.0.0.1:9");
        let outcome = store.search("   ", 10).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn search_succeeds_on_third_attempt() {
        let stub = testutil::serve(|path, hit| {
            if path.starts_with("/api/search") && hit >= 2 {
                (
                    200,
                    r#"{"results": [{"id": "m1", "score": 0.9, "content": "found it"}]}"#
                        .to_string(),
                )
            } else {
                (500, "{}".to_string())
            }
        })
        .await;

        let mut store = store_at(&stub.base_url);
        store.status = ConnectionStatus::Connected;

        let outcome = store.search("launch window", 5).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].id, "m1");
        assert_eq!(store.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn exhausted_retries_disconnect_with_error() {
        let stub = testutil::serve(|_, _| (500, "{}".to_string())).await;

        let mut store = store_at(&stub.base_url);
        store.status = ConnectionStatus::Connected;

        let outcome = store.search("launch window", 5).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.error.is_some());
        assert_eq!(store.status(), ConnectionStatus::Disconnected);
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn zero_matches_is_success_not_failure() {
        let stub = testutil::serve(|_, _| (200, r#"{"results": []}"#.to_string())).await;

        let mut store = store_at(&stub.base_url);
        store.status = ConnectionStatus::Connected;

        let outcome = store.search("nothing like this", 5).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.error.is_none());
        assert_eq!(store.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn health_check_flips_status_both_ways() {
        let stub = testutil::serve(|_, _| (200, r#"{"status": "ok"}"#.to_string())).await;
        let mut store = store_at(&stub.base_url);
        assert!(store.health_check().await);
        assert!(store.is_online());
        assert!(store.last_checked().is_some());

        let mut dead = store_at("http://127.0.0.1:9");
        dead.status = ConnectionStatus::Connected;
        assert!(!dead.health_check().await);
        assert_eq!(dead.status(), ConnectionStatus::Disconnected);
    }
}
