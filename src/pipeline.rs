//! End-to-end research run
//!
//! Search for URLs, fetch them through the coordinator, aggregate the
//! results. Report formatting and persistence are left to the caller so the
//! CLI and the web service can each decide where the report goes.

use crate::config::Config;
use crate::crawler::{FetchCoordinator, HttpRenderer, PageRenderer};
use crate::events::{ProgressEvent, ProgressSink};
use crate::output::{AggregateReport, Aggregator};
use crate::search::{DuckDuckGoSearch, OllamaClient, QueryGenerator, SearchProvider, Searcher};
use crate::Result;
use std::sync::Arc;
use tokio::time::Instant;

/// The external backends a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn QueryGenerator>,
    pub provider: Arc<dyn SearchProvider>,
    pub renderer: Arc<dyn PageRenderer>,
}

impl Collaborators {
    /// Ollama, DuckDuckGo and the HTTP renderer, configured from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator = OllamaClient::new(&config.searcher)?;
        let provider = DuckDuckGoSearch::new(
            config.fetcher.user_agent.clone(),
            config.fetcher.request_timeout(),
        );
        let renderer = HttpRenderer::new(&config.fetcher);

        Ok(Self {
            generator: Arc::new(generator),
            provider: Arc::new(provider),
            renderer: Arc::new(renderer),
        })
    }
}

/// What a finished run hands back
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub topic: String,
    pub queries: Vec<String>,
    pub report: AggregateReport,
}

/// Runs search, fetch and aggregation for `topic`
///
/// Emits `status` events at each phase change plus whatever the searcher
/// and coordinator emit. Individual fetch failures end up in the report;
/// only query generation and renderer start-up failures are returned as
/// errors.
pub async fn run_research(
    topic: &str,
    config: &Config,
    collaborators: &Collaborators,
    sink: &dyn ProgressSink,
) -> Result<ResearchOutcome> {
    let start = Instant::now();

    sink.emit(ProgressEvent::status("searching", "Generating search queries..."));
    let searcher = Searcher::new(
        Arc::clone(&collaborators.generator),
        Arc::clone(&collaborators.provider),
        config.searcher.clone(),
    );
    let search = searcher.search(topic, sink).await?;
    let urls = search.unique_urls;

    if urls.is_empty() {
        tracing::warn!("No URLs found for '{}'", topic);
        let report = Aggregator::new(Vec::new(), config.fetcher.max_content_chars)
            .finish(start.elapsed().as_millis() as u64);
        return Ok(ResearchOutcome {
            topic: topic.to_string(),
            queries: search.queries,
            report,
        });
    }

    sink.emit(ProgressEvent::status(
        "scraping",
        format!("Scraping {} URLs...", urls.len()),
    ));

    collaborators.renderer.start().await?;
    let coordinator = FetchCoordinator::new(Arc::clone(&collaborators.renderer), &config.fetcher);
    let results = coordinator.fetch_many(&urls, sink).await;
    if let Err(e) = collaborators.renderer.stop().await {
        tracing::warn!("Renderer did not stop cleanly: {}", e);
    }

    let mut aggregator = Aggregator::new(urls, config.fetcher.max_content_chars);
    aggregator.record_all(results);
    let report = aggregator.finish(start.elapsed().as_millis() as u64);

    tracing::info!(
        "Research finished: {} scraped, {} failed in {} ms",
        report.pages_scraped(),
        report.pages_failed(),
        report.elapsed_ms()
    );

    Ok(ResearchOutcome {
        topic: topic.to_string(),
        queries: search.queries,
        report,
    })
}
