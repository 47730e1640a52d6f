//! Shared mock backends for integration tests

use async_trait::async_trait;
use deep_research::config::FetcherConfig;
use deep_research::crawler::{PageRenderer, RenderConfig, RenderError, RenderOutput};
use deep_research::search::{QueryGenerator, SearchError, SearchHit, SearchProvider, SearchQuery};
use deep_research::FetchRequest;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// What the mock renderer does for one call
#[derive(Debug, Clone)]
pub enum Step {
    /// Succeed with this body after the delay
    Content(String, Duration),
    /// Answer with an HTTP error status
    Status(u16),
    /// Never answer (until the fetcher's deadline fires)
    Hang,
    /// Backend reports failure without content
    Fail(String),
    /// Transport-level error
    Error(String),
}

impl Step {
    pub fn content(body: &str) -> Self {
        Step::Content(body.to_string(), Duration::ZERO)
    }

    pub fn slow(body: &str, delay: Duration) -> Self {
        Step::Content(body.to_string(), delay)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted renderer keyed by URL
///
/// Each URL plays its steps in order and then repeats `fallback`. It also
/// records call times, lifecycle calls and the peak number of renders in
/// flight at once.
pub struct MockRenderer {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Step,
    calls: Mutex<Vec<(String, Instant)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockRenderer {
    pub fn new(fallback: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn script(self, url: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into_iter().collect());
        self
    }

    pub fn calls_for(&self, url: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn next_step(&self, url: &str) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn start(&self) -> Result<(), RenderError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), RenderError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn render(
        &self,
        request: &FetchRequest,
        _config: &RenderConfig,
    ) -> Result<RenderOutput, RenderError> {
        let url = request.as_str().to_string();
        let step = self.next_step(&url);
        self.calls.lock().unwrap().push((url, Instant::now()));

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        match step {
            Step::Content(body, delay) => {
                tokio::time::sleep(delay).await;
                Ok(RenderOutput::rendered(Some(200), body, None))
            }
            Step::Status(status) => Ok(RenderOutput::failed(Some(status), format!("HTTP {status}"))),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(RenderOutput::failed(None, "hung renderer woke up"))
            }
            Step::Fail(message) => Ok(RenderOutput::failed(None, message)),
            Step::Error(message) => Err(RenderError::Transport(message)),
        }
    }
}

/// Returns the same queries for every topic
pub struct FixedGenerator(pub Vec<String>);

impl FixedGenerator {
    pub fn new(queries: &[&str]) -> Self {
        Self(queries.iter().map(|q| q.to_string()).collect())
    }
}

#[async_trait]
impl QueryGenerator for FixedGenerator {
    async fn generate(&self, _topic: &str, count: usize) -> Result<Vec<String>, SearchError> {
        Ok(self.0.iter().take(count).cloned().collect())
    }
}

/// Always fails like an unreachable model server
pub struct OfflineGenerator;

#[async_trait]
impl QueryGenerator for OfflineGenerator {
    async fn generate(&self, _topic: &str, _count: usize) -> Result<Vec<String>, SearchError> {
        Err(SearchError::Connection(
            "Cannot reach Ollama at http://localhost:11434".to_string(),
        ))
    }
}

/// Serves hits from a query -> URLs table
pub struct TableProvider(pub HashMap<String, Vec<String>>);

impl TableProvider {
    pub fn new(entries: &[(&str, &[&str])]) -> Self {
        Self(
            entries
                .iter()
                .map(|(q, urls)| (q.to_string(), urls.iter().map(|u| u.to_string()).collect()))
                .collect(),
        )
    }
}

impl SearchProvider for TableProvider {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self
            .0
            .get(&query.text)
            .map(|urls| {
                urls.iter()
                    .take(query.max_results)
                    .map(|url| SearchHit {
                        title: format!("Title for {url}"),
                        url: url.clone(),
                        snippet: String::new(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Fetcher settings with a short deadline and the default 0.5s backoff
pub fn fetcher_config(semaphore_limit: usize, max_retries: u32) -> FetcherConfig {
    FetcherConfig {
        semaphore_limit,
        max_retries,
        request_timeout_ms: 1_000,
        retry_backoff_secs: 0.5,
        ..Default::default()
    }
}

pub fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
