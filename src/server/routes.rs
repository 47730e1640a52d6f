//! HTTP API route definitions

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/research", post(handlers::start_research))
        .route("/research/:job_id", get(handlers::get_job))
        .route("/research/:job_id/stream", get(handlers::stream_job))
        .route("/reports", get(handlers::list_reports))
        .route(
            "/reports/:report_id",
            get(handlers::get_report).delete(handlers::delete_report),
        );

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .with_state(state)
}
