//! Result aggregation
//!
//! Partitions fetch results into a success map (URL -> stored content) and a
//! failure map (URL -> error), both in arrival order. A URL lives in at most
//! one map; a later result for the same URL replaces the earlier one.

use crate::crawler::{FetchOutcome, FetchResult};
use crate::output::sanitize::truncate_chars;

/// Final aggregated outcome of one research run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReport {
    urls: Vec<String>,
    successes: Vec<(String, String)>,
    errors: Vec<(String, String)>,
    elapsed_ms: u64,
}

impl AggregateReport {
    /// Every URL the run set out to fetch, in discovery order
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// URL -> stored (truncated) content, in completion order
    pub fn successes(&self) -> &[(String, String)] {
        &self.successes
    }

    /// URL -> error message, in completion order
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn pages_scraped(&self) -> usize {
        self.successes.len()
    }

    pub fn pages_failed(&self) -> usize {
        self.errors.len()
    }

    pub fn content(&self, url: &str) -> Option<&str> {
        lookup(&self.successes, url)
    }

    pub fn error(&self, url: &str) -> Option<&str> {
        lookup(&self.errors, url)
    }

    /// Characters of stored content across all successes
    pub fn total_chars(&self) -> usize {
        self.successes.iter().map(|(_, c)| c.chars().count()).sum()
    }
}

/// Builds an `AggregateReport` as results arrive
#[derive(Debug)]
pub struct Aggregator {
    max_content_chars: usize,
    report: AggregateReport,
}

impl Aggregator {
    pub fn new(urls: Vec<String>, max_content_chars: usize) -> Self {
        Self {
            max_content_chars,
            report: AggregateReport {
                urls,
                ..Default::default()
            },
        }
    }

    /// Records one result, truncating successful content
    pub fn record(&mut self, result: FetchResult) {
        let FetchResult { url, outcome, .. } = result;
        match outcome {
            FetchOutcome::Success { raw_markdown, .. } => {
                let content = truncate_chars(&raw_markdown, self.max_content_chars).to_string();
                remove(&mut self.report.errors, &url);
                upsert(&mut self.report.successes, url, content);
            }
            FetchOutcome::Failure { error } => {
                remove(&mut self.report.successes, &url);
                upsert(&mut self.report.errors, url, error);
            }
        }
    }

    pub fn record_all(&mut self, results: impl IntoIterator<Item = FetchResult>) {
        for result in results {
            self.record(result);
        }
    }

    /// Freezes the report
    pub fn finish(mut self, elapsed_ms: u64) -> AggregateReport {
        self.report.elapsed_ms = elapsed_ms;
        self.report
    }
}

fn lookup<'a>(entries: &'a [(String, String)], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Replaces the value in place when the key exists, else appends
fn upsert(entries: &mut Vec<(String, String)>, key: String, value: String) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

fn remove(entries: &mut Vec<(String, String)>, key: &str) {
    entries.retain(|(k, _)| k != key);
}
