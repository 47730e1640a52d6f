//! Topic -> queries -> deduplicated URLs

use crate::config::SearcherConfig;
use crate::events::{ProgressEvent, ProgressSink};
use crate::search::generator::QueryGenerator;
use crate::search::provider::{SearchHit, SearchProvider, SearchQuery};
use crate::search::SearchError;
use crate::url::dedup_key;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;

/// A search hit tagged with the query that found it
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source_query: String,
}

/// Everything one search phase produced
#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub topic: String,
    pub queries: Vec<String>,
    /// All hits, in query order, duplicates included
    pub results: Vec<SearchResult>,
    /// First occurrence of each distinct URL, in discovery order
    pub unique_urls: Vec<String>,
    pub elapsed_ms: u64,
}

/// Runs query generation and web searches for a topic
pub struct Searcher {
    generator: Arc<dyn QueryGenerator>,
    provider: Arc<dyn SearchProvider>,
    config: SearcherConfig,
}

impl Searcher {
    pub fn new(
        generator: Arc<dyn QueryGenerator>,
        provider: Arc<dyn SearchProvider>,
        config: SearcherConfig,
    ) -> Self {
        Self {
            generator,
            provider,
            config,
        }
    }

    /// Asks the generator for queries and announces them
    pub async fn generate_queries(
        &self,
        topic: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, SearchError> {
        let queries = self.generator.generate(topic, self.config.num_queries).await?;
        tracing::info!("Generated {} queries", queries.len());
        sink.emit(ProgressEvent::Queries {
            queries: queries.clone(),
        });
        Ok(queries)
    }

    /// Generates queries, searches them and deduplicates the hits
    ///
    /// Only query generation can fail. A failing individual search is logged
    /// and contributes no hits.
    pub async fn search(&self, topic: &str, sink: &dyn ProgressSink) -> Result<SearchReport, SearchError> {
        let start = Instant::now();
        let queries = self.generate_queries(topic, sink).await?;

        let concurrency = self.config.max_concurrent_searches.max(1);
        let per_query: Vec<Vec<SearchHit>> = stream::iter(queries.iter().cloned())
            .map(|query| self.run_one(query))
            .buffered(concurrency)
            .collect()
            .await;

        let mut results = Vec::new();
        let mut unique_urls = Vec::new();
        let mut seen = HashSet::new();

        for (query, hits) in queries.iter().zip(per_query) {
            for hit in hits {
                if seen.insert(dedup_key(&hit.url)) {
                    unique_urls.push(hit.url.clone());
                    sink.emit(ProgressEvent::UrlFound {
                        url: hit.url.clone(),
                        title: hit.title.clone(),
                        query: query.clone(),
                    });
                }
                results.push(SearchResult {
                    title: hit.title,
                    url: hit.url,
                    snippet: hit.snippet,
                    source_query: query.clone(),
                });
            }
        }

        tracing::info!(
            "Search finished: {} hits, {} unique URLs",
            results.len(),
            unique_urls.len()
        );

        Ok(SearchReport {
            topic: topic.to_string(),
            queries,
            results,
            unique_urls,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn run_one(&self, text: String) -> Vec<SearchHit> {
        let query = SearchQuery {
            text,
            region: self.config.region.clone(),
            safesearch: self.config.safesearch.clone(),
            timelimit: self.config.timelimit.clone(),
            max_results: self.config.results_per_query,
        };
        let provider = Arc::clone(&self.provider);
        let label = query.text.clone();

        match tokio::task::spawn_blocking(move || provider.search(&query)).await {
            Ok(Ok(hits)) => {
                tracing::debug!("Query '{}' returned {} hits", label, hits.len());
                hits.into_iter().filter(|hit| !hit.url.is_empty()).collect()
            }
            Ok(Err(e)) => {
                tracing::warn!("Search failed for '{}': {}", label, e);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Search task for '{}' did not finish: {}", label, e);
                Vec::new()
            }
        }
    }
}
