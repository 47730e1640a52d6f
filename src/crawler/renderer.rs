//! Page rendering backend interface
//!
//! A renderer is a stateful, lifecycle-scoped resource: the owner calls
//! `start` once before any fetch in a run and `stop` once after every fetch
//! has finished. `render` turns one URL into markdown.

use crate::config::{CacheMode, FetcherConfig};
use crate::url::FetchRequest;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Per-render settings derived from the fetcher configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub page_timeout: Duration,
    pub excluded_tags: Vec<String>,
    pub cache_mode: CacheMode,
    pub pruning_threshold: f64,
    pub min_word_threshold: usize,
}

impl From<&FetcherConfig> for RenderConfig {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            page_timeout: config.page_timeout(),
            excluded_tags: config.excluded_tags.clone(),
            cache_mode: config.cache_mode,
            pruning_threshold: config.pruning_threshold,
            min_word_threshold: config.min_word_threshold,
        }
    }
}

/// What the backend reported for one render
///
/// A non-success output is an operation-level failure (the backend answered
/// but could not produce content); transport problems are `RenderError`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    pub success: bool,
    pub status_code: Option<u16>,
    pub raw_markdown: Option<String>,
    pub fit_markdown: Option<String>,
    pub error_message: Option<String>,
}

impl RenderOutput {
    /// A successful render
    pub fn rendered(
        status_code: Option<u16>,
        raw_markdown: impl Into<String>,
        fit_markdown: Option<String>,
    ) -> Self {
        Self {
            success: true,
            status_code,
            raw_markdown: Some(raw_markdown.into()),
            fit_markdown,
            error_message: None,
        }
    }

    /// The backend answered but produced nothing usable
    pub fn failed(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Transport or service failure while rendering
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer has not been started")]
    NotStarted,

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Backend(String),
}

impl RenderError {
    /// Short failure category, used as the prefix of recorded error strings
    pub fn category(&self) -> &'static str {
        match self {
            RenderError::NotStarted => "NotStarted",
            RenderError::Timeout(_) => "TimeoutError",
            RenderError::Connect(_) => "ConnectError",
            RenderError::Transport(_) => "TransportError",
            RenderError::Backend(_) => "BackendError",
        }
    }
}

impl From<reqwest::Error> for RenderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RenderError::Timeout(e.to_string())
        } else if e.is_connect() {
            RenderError::Connect(e.to_string())
        } else {
            RenderError::Transport(e.to_string())
        }
    }
}

/// A page rendering backend
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Acquires backend resources; must succeed before `render` is used
    async fn start(&self) -> Result<(), RenderError>;

    /// Releases backend resources
    async fn stop(&self) -> Result<(), RenderError>;

    /// Renders one page to markdown
    async fn render(
        &self,
        request: &FetchRequest,
        config: &RenderConfig,
    ) -> Result<RenderOutput, RenderError>;
}
