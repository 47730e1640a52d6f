//! HTTP request handlers

use crate::config::Config;
use crate::events::ProgressEvent;
use crate::search::OllamaClient;
use crate::server::jobs::{JobError, JobManager};
use crate::server::store::StoreError;
use crate::server::types::*;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobManager>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(jobs: JobManager) -> Self {
        let config = Arc::new(jobs.config().clone());
        Self {
            jobs: Arc::new(jobs),
            config,
        }
    }
}

/// An error response with a `{"detail": ...}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Busy => Self::new(StatusCode::CONFLICT, err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Report store failure: {}", err);
        Self::internal()
    }
}

/// Runs a report store call on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!("Report store task failed: {}", e);
            Err(ApiError::internal())
        }
    }
}

/// Landing page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Start a new research job
pub async fn start_research(
    State(state): State<AppState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate().map_err(ApiError::bad_request)?;

    if state.jobs.is_busy() {
        return Err(JobError::Busy.into());
    }

    tracing::info!("Starting research: {:?}", request.topic);
    let job = state.jobs.start(&request)?;
    Ok(Json(job.snapshot().into()))
}

/// Current status of a job
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    state
        .jobs
        .get(&job_id)
        .map(|job| Json(job.snapshot()))
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

fn to_sse(event: ProgressEvent) -> Event {
    let data = event.data_json().unwrap_or_else(|e| {
        tracing::warn!("SSE serialization error: {}", e);
        "{}".to_string()
    });
    Event::default().event(event.event_name()).data(data)
}

/// Replayed history followed by live events, ending after the terminal one
///
/// Once `complete` or `error` has been yielded the live receiver is never
/// polled again, so the stream closes even though the job's sender lives on.
fn progress_events(
    job_id: String,
    history: Vec<ProgressEvent>,
    rx: broadcast::Receiver<ProgressEvent>,
) -> impl Stream<Item = ProgressEvent> {
    let live = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!("SSE client lagged for job {}: missed {} events", job_id, n);
                None
            }
        };
        futures::future::ready(event)
    });
    let events = Box::pin(stream::iter(history).chain(live));

    stream::unfold((events, false), |(mut events, finished)| async move {
        if finished {
            return None;
        }
        let event = events.next().await?;
        let finished = event.is_terminal();
        Some((event, (events, finished)))
    })
}

/// Progress stream for a job
///
/// Replays every event recorded so far, then follows live events. The
/// stream ends after `complete` or `error`.
pub async fn stream_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    let (history, rx) = job.subscribe();
    tracing::debug!("SSE client connected for job {} ({} replayed)", job_id, history.len());

    let events = progress_events(job_id, history, rx).map(|event| Ok(to_sse(event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default().interval(Duration::from_secs(15))))
}

/// All saved reports, newest first
pub async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<ReportSummary>>, ApiError> {
    let store = state.jobs.store().clone();
    blocking(move || store.list()).await.map(Json)
}

/// One report with content
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<ReportDetail>, ApiError> {
    let store = state.jobs.store().clone();
    blocking(move || store.get(&report_id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Report not found"))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let store = state.jobs.store().clone();
    if blocking(move || store.delete(&report_id)).await? {
        Ok(Json(DeleteResponse { deleted: true }))
    } else {
        Err(ApiError::not_found("Report not found"))
    }
}

/// Whether the language model backend answers
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut searcher = state.config.searcher.clone();
    searcher.ollama_timeout_secs = HEALTH_TIMEOUT_SECS;

    let models = match OllamaClient::new(&searcher) {
        Ok(client) => client.list_models().await,
        Err(e) => Err(e),
    };

    match models {
        Ok(models) => Json(HealthResponse {
            status: "ok".to_string(),
            ollama_reachable: true,
            ollama_models: models,
        }),
        Err(e) => {
            tracing::debug!("Health check failed: {}", e);
            Json(HealthResponse {
                status: "degraded".to_string(),
                ollama_reachable: false,
                ollama_models: Vec::new(),
            })
        }
    }
}

/// Fallback for unmatched routes
pub async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Not Found")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Deep Research</title>
<style>
body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
input { width: 70%; padding: .4rem; }
#log { white-space: pre-wrap; font-family: monospace; background: #f4f4f4; padding: 1rem; }
</style>
</head>
<body>
<h1>Deep Research</h1>
<form id="form">
  <input id="topic" placeholder="Research topic" maxlength="500" required>
  <button type="submit">Research</button>
</form>
<div id="log"></div>
<h2>Reports</h2>
<ul id="reports"></ul>
<script>
const log = document.getElementById('log');
const say = (line) => { log.textContent += line + '\n'; };

async function loadReports() {
  const list = document.getElementById('reports');
  list.innerHTML = '';
  for (const r of await (await fetch('/api/reports')).json()) {
    const li = document.createElement('li');
    li.textContent = `${r.topic} (${r.pages_scraped} sources, ${r.created_at})`;
    li.onclick = async () => {
      const detail = await (await fetch(`/api/reports/${r.id}`)).json();
      log.textContent = detail.content;
    };
    list.appendChild(li);
  }
}

document.getElementById('form').onsubmit = async (e) => {
  e.preventDefault();
  log.textContent = '';
  const res = await fetch('/api/research', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ topic: document.getElementById('topic').value }),
  });
  const body = await res.json();
  if (!res.ok) { say(body.detail); return; }
  const source = new EventSource(`/api/research/${body.job_id}/stream`);
  for (const name of ['status', 'queries', 'url_found', 'scrape_progress']) {
    source.addEventListener(name, (m) => say(`${name}: ${m.data}`));
  }
  source.addEventListener('complete', (m) => { say(`complete: ${m.data}`); source.close(); loadReports(); });
  source.addEventListener('error', (m) => { if (m.data) say(`error: ${m.data}`); source.close(); });
};

loadReports();
</script>
</body>
</html>
"#;
