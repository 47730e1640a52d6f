//! Deep Research: a topic-to-report research pipeline
//!
//! This crate turns a research topic into a markdown report. A language model
//! proposes search queries, a web search provider discovers URLs, and a
//! bounded-concurrency fetcher renders each page to markdown with per-request
//! timeouts and retry/backoff. Results are aggregated, sanitized and assembled
//! into a single document, either from the command line or through a small
//! web service with job tracking and live progress streaming.

pub mod config;
pub mod crawler;
pub mod events;
pub mod output;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod url;

use thiserror::Error;

/// Main error type for Deep Research operations
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error(transparent)]
    Search(#[from] search::SearchError),

    #[error("Page renderer error: {0}")]
    Render(#[from] crawler::RenderError),

    #[error(transparent)]
    Store(#[from] server::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Empty URL")]
    Empty,

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Deep Research operations
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchCoordinator, FetchOutcome, FetchResult, Fetcher, PageRenderer};
pub use events::{ProgressEvent, ProgressSink};
pub use output::{assemble_report, sanitize_markdown, AggregateReport};
pub use pipeline::{run_research, Collaborators, ResearchOutcome};
pub use url::{dedup_key, validate_url, FetchRequest};
