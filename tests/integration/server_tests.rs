//! Web service tests over a real loopback listener

use crate::common::{fetcher_config, FixedGenerator, MockRenderer, OfflineGenerator, Step, TableProvider};
use deep_research::config::Config;
use deep_research::search::QueryGenerator;
use deep_research::server::{
    build_app, AppState, BackendFactory, DeleteResponse, HealthResponse, JobManager, JobResponse,
    JobStatusResponse, ReportDetail, ReportStore, ReportSummary,
};
use deep_research::Collaborators;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    base: String,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn start_job(&self, topic: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/research"))
            .json(&json!({ "topic": topic }))
            .send()
            .await
            .unwrap()
    }

    /// Polls until the job reaches a terminal status
    async fn wait_for(&self, job_id: &str) -> JobStatusResponse {
        for _ in 0..200 {
            let status: JobStatusResponse = self
                .client
                .get(self.url(&format!("/api/research/{job_id}")))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if status.status == "completed" || status.status == "failed" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {job_id} did not finish");
    }
}

fn backends(generator: Arc<dyn QueryGenerator>, delay: Duration) -> BackendFactory {
    Arc::new(move |_config: &Config| {
        Ok(Collaborators {
            generator: Arc::clone(&generator),
            provider: Arc::new(TableProvider::new(&[
                ("rust async", &["https://a.test", "https://b.test"]),
                ("tokio internals", &["https://c.test", "https://a.test"]),
            ])),
            renderer: Arc::new(
                MockRenderer::new(Step::slow("page body", delay))
                    .script("https://c.test", vec![Step::Status(404)]),
            ),
        })
    })
}

async fn spawn_server(factory: BackendFactory) -> TestServer {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.fetcher = fetcher_config(4, 1);
    config.searcher.num_queries = 2;
    // nothing listens here, so health reports degraded
    config.searcher.ollama_host = "http://127.0.0.1:9".to_string();

    let store = ReportStore::new(dir.path());
    let state = AppState::new(JobManager::with_backends(config, store, factory));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_app(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

async fn default_server() -> TestServer {
    let generator = Arc::new(FixedGenerator::new(&["rust async", "tokio internals"]));
    spawn_server(backends(generator, Duration::ZERO)).await
}

#[tokio::test]
async fn test_index_page() {
    let server = default_server().await;

    let response = server.client.get(server.url("/")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("Deep Research"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = default_server().await;

    let response = server.client.get(server.url("/api/nope")).send().await.unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Not Found");
}

#[tokio::test]
async fn test_rejects_invalid_requests() {
    let server = default_server().await;

    let empty = server.start_job("   ").await;
    assert_eq!(empty.status(), 400);
    let body: Value = empty.json().await.unwrap();
    assert_eq!(body["detail"], "Topic cannot be empty");

    let too_many = server
        .client
        .post(server.url("/api/research"))
        .json(&json!({ "topic": "rust", "num_queries": 50 }))
        .send()
        .await
        .unwrap();
    assert_eq!(too_many.status(), 400);

    let malformed = server
        .client
        .post(server.url("/api/research"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);
}

#[tokio::test]
async fn test_unknown_job_and_report() {
    let server = default_server().await;

    let job = server.client.get(server.url("/api/research/deadbeef")).send().await.unwrap();
    assert_eq!(job.status(), 404);
    let stream = server
        .client
        .get(server.url("/api/research/deadbeef/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 404);

    let report = server.client.get(server.url("/api/reports/abcdef12")).send().await.unwrap();
    assert_eq!(report.status(), 404);
    let body: Value = report.json().await.unwrap();
    assert_eq!(body["detail"], "Report not found");

    // path traversal never reaches the filesystem
    let sneaky = server
        .client
        .delete(server.url("/api/reports/..%2Fsecret"))
        .send()
        .await
        .unwrap();
    assert_eq!(sneaky.status(), 404);
}

#[tokio::test]
async fn test_job_lifecycle_and_reports() {
    let server = default_server().await;

    let response = server.start_job("Rust async").await;
    assert_eq!(response.status(), 200);
    let created: JobResponse = response.json().await.unwrap();
    assert_eq!(created.topic, "Rust async");
    assert_eq!(created.job_id.len(), 8);

    let status = server.wait_for(&created.job_id).await;
    assert_eq!(status.status, "completed");
    assert_eq!(status.urls_found, 3);
    assert_eq!(status.pages_scraped, 2);
    assert_eq!(status.pages_failed, 1);
    let report_id = status.report_id.unwrap();

    let reports: Vec<ReportSummary> = server
        .client
        .get(server.url("/api/reports"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, report_id);
    assert_eq!(reports[0].topic, "Rust async");
    assert!(reports[0].file_size > 0);

    let detail: ReportDetail = server
        .client
        .get(server.url(&format!("/api/reports/{report_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(detail.content.contains("Rust async"));
    assert!(detail.content.contains("page body"));
    assert_eq!(detail.summary.pages_scraped, 2);

    let deleted: DeleteResponse = server
        .client
        .delete(server.url(&format!("/api/reports/{report_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(deleted.deleted);

    let again = server
        .client
        .delete(server.url(&format!("/api/reports/{report_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn test_second_job_conflicts_while_running() {
    let generator = Arc::new(FixedGenerator::new(&["rust async", "tokio internals"]));
    let server = spawn_server(backends(generator, Duration::from_millis(400))).await;

    let first: JobResponse = server.start_job("first").await.json().await.unwrap();
    let second = server.start_job("second").await;

    assert_eq!(second.status(), 409);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["detail"], "A research job is already running. Please wait.");

    server.wait_for(&first.job_id).await;
    // the gate opens once the first job is done
    let mut accepted = false;
    for _ in 0..40 {
        if server.start_job("third").await.status() == 200 {
            accepted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(accepted);
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let server = spawn_server(backends(Arc::new(OfflineGenerator), Duration::ZERO)).await;

    let created: JobResponse = server.start_job("anything").await.json().await.unwrap();
    let status = server.wait_for(&created.job_id).await;

    assert_eq!(status.status, "failed");
    assert!(status.error.unwrap().contains("Cannot reach Ollama"));
    assert!(status.report_id.is_none());
}

#[tokio::test]
async fn test_stream_replays_finished_job() {
    let server = default_server().await;

    let created: JobResponse = server.start_job("Rust async").await.json().await.unwrap();
    server.wait_for(&created.job_id).await;

    let response = server
        .client
        .get(server.url(&format!("/api/research/{}/stream", created.job_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    // the stream closes on its own after the terminal event
    let body = tokio::time::timeout(Duration::from_secs(5), response.text())
        .await
        .unwrap()
        .unwrap();
    let queries = body.find("event: queries").unwrap();
    let complete = body.find("event: complete").unwrap();
    assert!(queries < complete);
    assert_eq!(body.matches("event: url_found").count(), 3);
    assert_eq!(body.matches("event: scrape_progress").count(), 3);
    assert_eq!(body.matches("event: complete").count(), 1);
}

#[tokio::test]
async fn test_stream_follows_running_job_to_completion() {
    let generator = Arc::new(FixedGenerator::new(&["rust async", "tokio internals"]));
    let server = spawn_server(backends(generator, Duration::from_millis(300))).await;

    let created: JobResponse = server.start_job("Rust async").await.json().await.unwrap();
    let response = server
        .client
        .get(server.url(&format!("/api/research/{}/stream", created.job_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = tokio::time::timeout(Duration::from_secs(10), response.text())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(body.matches("event: scrape_progress").count(), 3);
    assert!(body.trim_end().ends_with('}'));
    let last_event = body.rfind("event: ").unwrap();
    assert!(body[last_event..].starts_with("event: complete"));
}

#[tokio::test]
async fn test_health_degraded_without_ollama() {
    let server = default_server().await;

    let health: HealthResponse = server
        .client
        .get(server.url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health.status, "degraded");
    assert!(!health.ollama_reachable);
    assert!(health.ollama_models.is_empty());
}
