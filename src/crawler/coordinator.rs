//! Fetch coordinator
//!
//! Fans out one fetch per URL, all sharing one gate, and collects results in
//! completion order. Each completion emits a `scrape_progress` event carrying
//! the running completed/total counter.

use crate::config::FetcherConfig;
use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::renderer::PageRenderer;
use crate::events::{ProgressEvent, ProgressSink};
use crate::url::validate_url;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;

/// Drives a batch of fetches for one run
pub struct FetchCoordinator {
    fetcher: Fetcher,
}

impl FetchCoordinator {
    /// Creates a coordinator with a fresh gate for this run
    pub fn new(renderer: Arc<dyn PageRenderer>, config: &FetcherConfig) -> Self {
        Self {
            fetcher: Fetcher::new(renderer, config),
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetches every URL and returns one result per input, in completion order
    ///
    /// URLs that fail validation become failure results without a network
    /// attempt; they complete first. Duplicates are fetched once per
    /// occurrence.
    ///
    /// # Arguments
    ///
    /// * `urls` - The URLs to fetch
    /// * `sink` - Receives one `scrape_progress` event per completed URL
    pub async fn fetch_many(&self, urls: &[String], sink: &dyn ProgressSink) -> Vec<FetchResult> {
        let total = urls.len();
        let mut results = Vec::with_capacity(total);
        let mut requests = Vec::with_capacity(total);

        for url in urls {
            match validate_url(url) {
                Ok(request) => requests.push((url, request)),
                Err(e) => {
                    tracing::warn!("Skipping invalid URL {}: {}", url, e);
                    let result = FetchResult::failure(url.as_str(), format!("Invalid URL: {}", e), None, 0, 0);
                    Self::record(result, &mut results, total, sink);
                }
            }
        }

        tracing::info!(
            "Fetching {} URLs ({} concurrent)",
            requests.len(),
            self.fetcher.gate().capacity()
        );

        // results are keyed by the caller's spelling, not the normalized one
        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .map(|(url, request)| async move {
                let mut result = self.fetcher.fetch(request).await;
                result.url = (*url).clone();
                result
            })
            .collect();

        while let Some(result) = pending.next().await {
            Self::record(result, &mut results, total, sink);
        }

        results
    }

    fn record(
        result: FetchResult,
        results: &mut Vec<FetchResult>,
        total: usize,
        sink: &dyn ProgressSink,
    ) {
        let completed = results.len() + 1;
        match result.error() {
            None => tracing::info!(
                "[{}/{}] OK {} ({} chars, {} ms)",
                completed,
                total,
                result.url,
                result.raw_chars(),
                result.elapsed_ms
            ),
            Some(error) => tracing::warn!("[{}/{}] FAILED {}: {}", completed, total, result.url, error),
        }

        sink.emit(ProgressEvent::ScrapeProgress {
            url: result.url.clone(),
            success: result.is_success(),
            chars: result.raw_chars(),
            elapsed_ms: result.elapsed_ms,
            completed,
            total,
        });
        results.push(result);
    }
}
