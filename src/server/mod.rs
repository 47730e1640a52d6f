//! Web service exposing research jobs over HTTP
//!
//! Jobs are started with `POST /api/research` and followed either by polling
//! `GET /api/research/:id` or through the server-sent event stream at
//! `GET /api/research/:id/stream`. Finished reports are kept on disk and
//! served from `/api/reports`.

mod handlers;
mod jobs;
mod routes;
mod store;
mod types;

pub use handlers::{ApiError, AppState};
pub use jobs::{BackendFactory, Job, JobError, JobManager, JobSink, JobStatus};
pub use routes::create_router;
pub use store::{is_valid_id, ReportStore, StoreError};
pub use types::*;

use crate::config::Config;
use anyhow::{Context, Result};
use axum::http::Method;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// The full application: routes plus CORS and request tracing
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serves the application on an already-bound listener until ctrl-c
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    tracing::info!("Deep Research web service listening on http://{}", addr);

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Web service shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

/// Binds `server.host:server.port` and runs the web service
pub async fn serve(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let store = ReportStore::new(&config.server.reports_dir);
    let state = AppState::new(JobManager::new(config, store));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

    serve_on(listener, state).await
}
