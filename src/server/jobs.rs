//! Research job management
//!
//! Jobs run one at a time. A capacity-1 semaphore is acquired when the job is
//! created (so a busy server rejects immediately) and the permit travels with
//! the job's task, released on every exit path including panics.
//!
//! Each job keeps its full event history next to a broadcast channel, so
//! subscribers that connect late replay everything before going live.

use crate::config::Config;
use crate::events::{ProgressEvent, ProgressSink};
use crate::output::format_aggregate_report;
use crate::pipeline::{run_research, Collaborators};
use crate::server::store::ReportStore;
use crate::server::types::{JobStatusResponse, ResearchRequest};
use crate::{ResearchError, Result};
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

/// Buffered live events per job before slow subscribers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Builds the backends for one job from its effective configuration
pub type BackendFactory = Arc<dyn Fn(&Config) -> Result<Collaborators> + Send + Sync>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("A research job is already running. Please wait.")]
    Busy,
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Searching,
    Scraping,
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    /// Maps a `status` event phase onto a job status
    pub fn from_phase(phase: &str) -> Option<Self> {
        match phase {
            "pending" => Some(JobStatus::Pending),
            "searching" => Some(JobStatus::Searching),
            "scraping" => Some(JobStatus::Scraping),
            "generating" => Some(JobStatus::Generating),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Searching => "searching",
            JobStatus::Scraping => "scraping",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    report_id: Option<String>,
    error: Option<String>,
    elapsed_ms: u64,
    urls_found: usize,
    pages_scraped: usize,
    pages_failed: usize,
}

impl JobState {
    fn new() -> Self {
        Self {
            status: JobStatus::Pending,
            report_id: None,
            error: None,
            elapsed_ms: 0,
            urls_found: 0,
            pages_scraped: 0,
            pages_failed: 0,
        }
    }

    fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::UrlFound { .. } => self.urls_found += 1,
            ProgressEvent::ScrapeProgress { success: true, .. } => self.pages_scraped += 1,
            ProgressEvent::ScrapeProgress { success: false, .. } => self.pages_failed += 1,
            ProgressEvent::Status { status, .. } => {
                if let Some(status) = JobStatus::from_phase(status) {
                    self.status = status;
                }
            }
            ProgressEvent::Complete {
                report_id,
                elapsed_ms,
                urls_found,
                pages_scraped,
                pages_failed,
            } => {
                self.status = JobStatus::Completed;
                self.report_id = report_id.clone();
                self.elapsed_ms = *elapsed_ms;
                self.urls_found = *urls_found;
                self.pages_scraped = *pages_scraped;
                self.pages_failed = *pages_failed;
            }
            ProgressEvent::Error { message } => {
                self.status = JobStatus::Failed;
                self.error = Some(message.clone());
            }
            ProgressEvent::Queries { .. } => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One research job
pub struct Job {
    id: String,
    topic: String,
    created_at: String,
    seq: u64,
    state: Mutex<JobState>,
    history: Mutex<Vec<ProgressEvent>>,
    live: broadcast::Sender<ProgressEvent>,
}

impl Job {
    fn new(id: String, topic: String, seq: u64) -> Self {
        let (live, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id,
            topic,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            seq,
            state: Mutex::new(JobState::new()),
            history: Mutex::new(Vec::new()),
            live,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.state).status
    }

    pub fn snapshot(&self) -> JobStatusResponse {
        let state = lock(&self.state);
        JobStatusResponse {
            job_id: self.id.clone(),
            status: state.status.to_string(),
            topic: self.topic.clone(),
            created_at: self.created_at.clone(),
            report_id: state.report_id.clone(),
            error: state.error.clone(),
            elapsed_ms: state.elapsed_ms,
            urls_found: state.urls_found,
            pages_scraped: state.pages_scraped,
            pages_failed: state.pages_failed,
        }
    }

    /// Events so far plus a receiver for everything after them
    pub fn subscribe(&self) -> (Vec<ProgressEvent>, broadcast::Receiver<ProgressEvent>) {
        let history = lock(&self.history);
        (history.clone(), self.live.subscribe())
    }

    /// Records and broadcasts an event. Nothing is accepted after a
    /// terminal event.
    fn publish(&self, event: ProgressEvent) {
        {
            let mut state = lock(&self.state);
            if state.status.is_finished() {
                tracing::debug!("Job {} already finished, dropping {}", self.id, event.event_name());
                return;
            }
            state.apply(&event);
        }

        let mut history = lock(&self.history);
        history.push(event.clone());
        // no subscribers is fine
        let _ = self.live.send(event);
    }
}

/// Progress sink feeding one job
#[derive(Clone)]
pub struct JobSink {
    job: Arc<Job>,
}

impl JobSink {
    pub fn new(job: Arc<Job>) -> Self {
        Self { job }
    }
}

impl ProgressSink for JobSink {
    fn emit(&self, event: ProgressEvent) {
        self.job.publish(event);
    }
}

/// Owns the jobs and the single-run gate
pub struct JobManager {
    jobs: DashMap<String, Arc<Job>>,
    gate: Arc<Semaphore>,
    next_seq: AtomicU64,
    config: Config,
    store: ReportStore,
    backends: BackendFactory,
}

impl JobManager {
    /// A manager using the real backends
    pub fn new(config: Config, store: ReportStore) -> Self {
        Self::with_backends(config, store, Arc::new(Collaborators::from_config))
    }

    pub fn with_backends(config: Config, store: ReportStore, backends: BackendFactory) -> Self {
        Self {
            jobs: DashMap::new(),
            gate: Arc::new(Semaphore::new(1)),
            next_seq: AtomicU64::new(0),
            config,
            store,
            backends,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        self.jobs.get(id).map(|job| Arc::clone(job.value()))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Creates a job and starts it in the background
    ///
    /// Fails with `JobError::Busy` when another job holds the gate. The
    /// request must already be validated.
    pub fn start(&self, request: &ResearchRequest) -> std::result::Result<Arc<Job>, JobError> {
        let permit = Arc::clone(&self.gate)
            .try_acquire_owned()
            .map_err(|_| JobError::Busy)?;

        self.evict_oldest();

        let id = self.fresh_id();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let job = Arc::new(Job::new(id.clone(), request.topic.trim().to_string(), seq));
        self.jobs.insert(id.clone(), Arc::clone(&job));
        tracing::info!("Job {} created for topic {:?}", id, job.topic());

        let config = self.job_config(request);
        spawn_job(
            Arc::clone(&job),
            config,
            Arc::clone(&self.backends),
            self.store.clone(),
            permit,
        );
        Ok(job)
    }

    fn job_config(&self, request: &ResearchRequest) -> Config {
        let mut config = self.config.clone();
        if let Some(model) = &request.model {
            config.searcher.model = model.clone();
        }
        if let Some(n) = request.num_queries {
            config.searcher.num_queries = n;
        }
        if let Some(n) = request.results_per_query {
            config.searcher.results_per_query = n;
        }
        config
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().simple().to_string()[..8].to_string();
            if !self.jobs.contains_key(&id) {
                return id;
            }
        }
    }

    /// Makes room for one more job
    fn evict_oldest(&self) {
        let max_jobs = self.config.server.max_jobs.max(1);
        while self.jobs.len() >= max_jobs {
            let oldest = self
                .jobs
                .iter()
                .min_by_key(|entry| entry.value().seq)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(id) => {
                    tracing::debug!("Evicting job {}", id);
                    self.jobs.remove(&id);
                }
                None => break,
            }
        }
    }
}

/// Runs the job on its own task; a supervising task holds the permit and
/// turns a panic into a failed job.
fn spawn_job(
    job: Arc<Job>,
    config: Config,
    backends: BackendFactory,
    store: ReportStore,
    permit: OwnedSemaphorePermit,
) {
    let sink = JobSink::new(Arc::clone(&job));
    let worker = tokio::spawn(run_job(Arc::clone(&job), config, backends, store));

    tokio::spawn(async move {
        let _permit = permit;
        if let Err(e) = worker.await {
            tracing::error!("Job {} task aborted: {}", job.id(), e);
            sink.emit(ProgressEvent::Error {
                message: format!("Research task failed: {}", e),
            });
        }
    });
}

async fn run_job(job: Arc<Job>, config: Config, backends: BackendFactory, store: ReportStore) {
    let sink = JobSink::new(Arc::clone(&job));
    if let Err(e) = execute(&job, &config, &backends, &store, &sink).await {
        tracing::error!("Job {} failed: {}", job.id(), e);
        sink.emit(ProgressEvent::Error {
            message: e.to_string(),
        });
    }
}

async fn execute(
    job: &Job,
    config: &Config,
    backends: &BackendFactory,
    store: &ReportStore,
    sink: &JobSink,
) -> Result<()> {
    let collaborators = backends(config)?;
    let outcome = run_research(job.topic(), config, &collaborators, sink).await?;

    sink.emit(ProgressEvent::status("generating", "Generating report..."));
    let markdown = format_aggregate_report(&outcome.topic, &outcome.report);

    let report = outcome.report;
    let (id, topic, store) = (job.id().to_string(), job.topic().to_string(), store.clone());
    let summary = tokio::task::spawn_blocking(move || store.save(&id, &topic, &markdown, &report))
        .await
        .map_err(|e| ResearchError::Task(e.to_string()))??;

    tracing::info!(
        "Job {} completed: {} URLs, {} scraped, {} failed, {} ms",
        job.id(),
        summary.urls_found,
        summary.pages_scraped,
        summary.pages_failed,
        summary.elapsed_ms
    );

    sink.emit(ProgressEvent::Complete {
        report_id: Some(summary.id),
        elapsed_ms: summary.elapsed_ms,
        urls_found: summary.urls_found,
        pages_scraped: summary.pages_scraped,
        pages_failed: summary.pages_failed,
    });
    Ok(())
}
