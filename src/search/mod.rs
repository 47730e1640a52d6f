//! Search module for turning a topic into candidate URLs
//!
//! This module handles:
//! - Query generation through a local language model (Ollama)
//! - Parsing loosely formatted model output into queries
//! - Web search through DuckDuckGo's HTML endpoint
//! - Concurrent execution and URL deduplication

mod generator;
mod parse;
mod provider;
mod searcher;

pub use generator::{build_prompt, OllamaClient, QueryGenerator};
pub use parse::parse_queries;
pub use provider::{extract_ddg_url, parse_ddg_html, DuckDuckGoSearch, SearchHit, SearchProvider, SearchQuery};
pub use searcher::{SearchReport, SearchResult, Searcher};

use thiserror::Error;

/// Search-specific errors
#[derive(Debug, Error)]
pub enum SearchError {
    /// The language model backend could not be reached or answered with an error
    #[error("{0}")]
    Connection(String),

    /// The language model answered but no queries could be extracted
    #[error("{0}")]
    Parse(String),

    /// A single web search failed
    #[error("Search failed: {0}")]
    Provider(String),
}
