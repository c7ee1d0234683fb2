pub mod agent_store;
pub mod brain;
pub mod brain_store;
pub mod calendar_store;
pub mod spend_store;
pub mod storage;
pub mod task_store;

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use reqwest::Client;
use serde_json::Value;

use crate::config::BeaconConfig;
use crate::core::time;
use self::brain::BrainClient;

/// Age after which a successfully-fetched source is reported stale.
pub const FRESHNESS_THRESHOLD_MINUTES: i64 = 10;

/// The five named data feeds tracked by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Tasks,
    Calendar,
    Spend,
    Agents,
    Brain,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Self::Tasks,
        Self::Calendar,
        Self::Spend,
        Self::Agents,
        Self::Brain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Calendar => "calendar",
            Self::Spend => "spend",
            Self::Agents => "agents",
            Self::Brain => "brain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tasks" => Some(Self::Tasks),
            "calendar" => Some(Self::Calendar),
            "spend" => Some(Self::Spend),
            "agents" => Some(Self::Agents),
            "brain" => Some(Self::Brain),
            _ => None,
        }
    }

    /// Snapshot file served under the data base URL. The brain source
    /// has no snapshot; it is probed through its health endpoint.
    fn snapshot_path(&self) -> Option<&'static str> {
        match self {
            Self::Tasks => Some("tasks.json"),
            Self::Calendar => Some("mc-data.json"),
            Self::Spend => Some("model-usage-history.json"),
            Self::Agents => Some("agents.json"),
            Self::Brain => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Loading,
    Connected,
    Stale,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Connected => "connected",
            Self::Stale => "stale",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Per-source record of the last fetch cycle. Data survives failed
/// refreshes; stale-but-available beats empty.
#[derive(Debug, Clone)]
pub struct SourceState {
    pub data: Option<Value>,
    pub last_updated: Option<NaiveDateTime>,
    pub status: ConnectionStatus,
    pub error: Option<String>,
}

impl SourceState {
    fn new_loading() -> Self {
        Self {
            data: None,
            last_updated: None,
            status: ConnectionStatus::Loading,
            error: None,
        }
    }

    /// Stored status with freshness applied: a connected source whose
    /// last success is older than the threshold reports stale.
    pub fn computed_status(&self, now: NaiveDateTime) -> ConnectionStatus {
        match self.status {
            ConnectionStatus::Loading => ConnectionStatus::Loading,
            ConnectionStatus::Disconnected => ConnectionStatus::Disconnected,
            status => {
                if let Some(updated) = self.last_updated {
                    if now - updated > Duration::minutes(FRESHNESS_THRESHOLD_MINUTES) {
                        return ConnectionStatus::Stale;
                    }
                }
                status
            }
        }
    }
}

/// Status snapshot handed to listeners and the status bar.
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub status: ConnectionStatus,
    pub last_updated: Option<NaiveDateTime>,
    pub error: Option<String>,
}

pub type StatusMap = HashMap<Source, SourceHealth>;
pub type StatusListener = Box<dyn Fn(&StatusMap) + Send>;

/// Single point of truth for "is source X reachable and how fresh is
/// it". Fetches every source, absorbs network errors into per-source
/// status, and notifies subscribers after each cycle. Stores read
/// their snapshots from here and never touch the network themselves.
pub struct DataService {
    http: Client,
    base_url: String,
    brain: BrainClient,
    sources: HashMap<Source, SourceState>,
    listeners: Vec<StatusListener>,
}

impl DataService {
    pub fn new(config: &BeaconConfig) -> Result<Self, String> {
        let http = Client::builder()
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            http,
            base_url: config.data_url.trim_end_matches('/').to_string(),
            brain: BrainClient::new(&config.brain_url)?,
            sources: HashMap::new(),
            listeners: Vec::new(),
        })
    }

    /// Bring all five sources up together. Every fetch runs to
    /// completion; one source failing never blocks another. Listeners
    /// are notified exactly once at the end of the cycle.
    pub async fn init(&mut self) {
        log::info!("initializing all data sources...");
        self.fetch_all().await;
        self.notify_listeners();
        log::info!("initialization complete");
        self.log_statuses();
    }

    /// Re-fetch everything, keeping held data wherever a fetch fails.
    pub async fn refresh_all(&mut self) {
        log::info!("refreshing all sources...");
        self.fetch_all().await;
        self.notify_listeners();
        log::info!("refresh complete");
        self.log_statuses();
    }

    /// Re-fetch exactly one source, then notify listeners.
    pub async fn refresh(&mut self, source: Source) {
        self.mark_loading(source);
        let result = self.fetch_one(source).await;
        self.apply_result(source, result);
        self.notify_listeners();
    }

    /// Last successfully fetched snapshot, possibly stale. `None` if
    /// the source has never been fetched.
    pub fn get_data(&self, source: Source) -> Option<&Value> {
        self.sources.get(&source)?.data.as_ref()
    }

    pub fn get_status(&self, source: Source) -> ConnectionStatus {
        match self.sources.get(&source) {
            Some(state) => state.computed_status(time::now()),
            None => ConnectionStatus::Disconnected,
        }
    }

    /// Computed status of every tracked source.
    pub fn source_status(&self) -> StatusMap {
        let now = time::now();
        self.sources
            .iter()
            .map(|(source, state)| {
                (
                    *source,
                    SourceHealth {
                        status: state.computed_status(now),
                        last_updated: state.last_updated,
                        error: state.error.clone(),
                    },
                )
            })
            .collect()
    }

    /// Register a subscriber invoked with the full status map after
    /// every init/refresh cycle.
    pub fn on_status_change(&mut self, listener: impl Fn(&StatusMap) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    async fn fetch_all(&mut self) {
        for source in Source::ALL {
            self.mark_loading(source);
        }
        let fetches: Vec<_> = Source::ALL.iter().map(|s| self.fetch_one(*s)).collect();
        let results = futures::future::join_all(fetches).await;
        for (source, result) in Source::ALL.into_iter().zip(results) {
            self.apply_result(source, result);
        }
    }

    async fn fetch_one(&self, source: Source) -> Result<Value, String> {
        match source.snapshot_path() {
            Some(path) => self.fetch_snapshot(path).await,
            None => self.brain.health_with_retry().await,
        }
    }

    /// Fetch one snapshot file with a cache-busting query parameter.
    /// Non-success status and malformed JSON both count as failure.
    async fn fetch_snapshot(&self, path: &str) -> Result<Value, String> {
        let url = format!(
            "{}/{}?t={}",
            self.base_url,
            path,
            chrono::Local::now().timestamp_millis()
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| format!("invalid JSON: {}", e))
    }

    fn mark_loading(&mut self, source: Source) {
        let state = self
            .sources
            .entry(source)
            .or_insert_with(SourceState::new_loading);
        state.status = ConnectionStatus::Loading;
        state.error = None;
    }

    fn apply_result(&mut self, source: Source, result: Result<Value, String>) {
        let state = self
            .sources
            .entry(source)
            .or_insert_with(SourceState::new_loading);
        match result {
            Ok(data) => {
                log::info!("{} fetched{}", source.as_str(), success_detail(source, &data));
                state.data = Some(data);
                state.last_updated = Some(time::now());
                state.status = ConnectionStatus::Connected;
                state.error = None;
            }
            Err(e) => {
                // Never discard previously fetched data on failure.
                state.status = if state.data.is_some() {
                    ConnectionStatus::Stale
                } else {
                    ConnectionStatus::Disconnected
                };
                state.error = Some(e.clone());
                log::warn!("{} fetch FAILED - {}", source.as_str(), e);
            }
        }
    }

    fn notify_listeners(&self) {
        let status = self.source_status();
        for listener in &self.listeners {
            listener(&status);
        }
    }

    fn log_statuses(&self) {
        let now = time::now();
        let line = Source::ALL
            .iter()
            .filter_map(|s| {
                self.sources
                    .get(s)
                    .map(|state| format!("{}:{}", s.as_str(), state.computed_status(now).as_str()))
            })
            .collect::<Vec<_>>()
            .join(" | ");
        log::info!("Status: {}", line);
    }
}

fn success_detail(source: Source, data: &Value) -> String {
    match source {
        Source::Tasks => data
            .get("tasks")
            .and_then(Value::as_array)
            .map(|t| format!(" ({} tasks)", t.len()))
            .unwrap_or_default(),
        Source::Calendar => data
            .pointer("/calendar/events")
            .and_then(Value::as_array)
            .map(|e| format!(" ({} events)", e.len()))
            .unwrap_or_default(),
        Source::Agents => data
            .as_array()
            .map(|a| format!(" ({} agents)", a.len()))
            .unwrap_or_default(),
        Source::Spend => " (loaded)".to_string(),
        Source::Brain => " (online)".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Tiny HTTP/1.1 responder for exercising the fetch paths without
    /// a real backend. The router sees the request path (query
    /// included) and a per-server hit counter.
    pub(crate) struct StubServer {
        pub base_url: String,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Drop for StubServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    pub(crate) async fn serve<F>(router: F) -> StubServer
    where
        F: Fn(&str, usize) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let hit = hits.fetch_add(1, Ordering::SeqCst);
                let (status, body) = router(&path, hit);
                let reason = if status == 200 { "OK" } else { "NO" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        StubServer { base_url, handle }
    }
}
