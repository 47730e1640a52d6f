//! Fetch worker
//!
//! Fetches one URL through the page renderer with:
//! - admission through the run's concurrency gate, one slot per attempt
//! - a per-attempt deadline
//! - exponential backoff between retryable attempts
//! - classification of every failure into data (nothing escapes as an error)

use crate::config::FetcherConfig;
use crate::crawler::gate::ConcurrencyGate;
use crate::crawler::renderer::{PageRenderer, RenderConfig, RenderOutput};
use crate::url::FetchRequest;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Result of fetching one URL
///
/// Exactly one is produced per fetched URL. A success always carries
/// non-empty raw content and a failure always carries a non-empty error.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// The URL as requested
    pub url: String,

    /// Time spent in the deciding attempt, or the whole retry sequence when
    /// every attempt failed
    pub elapsed_ms: u64,

    /// HTTP status reported by the renderer, if any
    pub status_code: Option<u16>,

    /// Number of attempts made (0 when the URL was rejected up front)
    pub attempts: u32,

    pub outcome: FetchOutcome,
}

/// Success payload or failure description
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        raw_markdown: String,
        /// Pruned markdown, when the renderer produced any
        fit_markdown: Option<String>,
    },
    Failure {
        error: String,
    },
}

impl FetchResult {
    pub(crate) fn success(
        url: impl Into<String>,
        raw_markdown: String,
        fit_markdown: Option<String>,
        status_code: Option<u16>,
        elapsed_ms: u64,
        attempts: u32,
    ) -> Self {
        debug_assert!(!raw_markdown.trim().is_empty());
        Self {
            url: url.into(),
            elapsed_ms,
            status_code,
            attempts,
            outcome: FetchOutcome::Success {
                raw_markdown,
                fit_markdown,
            },
        }
    }

    pub(crate) fn failure(
        url: impl Into<String>,
        error: impl Into<String>,
        status_code: Option<u16>,
        elapsed_ms: u64,
        attempts: u32,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Unknown error".to_string();
        }
        Self {
            url: url.into(),
            elapsed_ms,
            status_code,
            attempts,
            outcome: FetchOutcome::Failure { error },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }

    /// Raw markdown of a successful fetch
    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { raw_markdown, .. } => Some(raw_markdown),
            FetchOutcome::Failure { .. } => None,
        }
    }

    /// Pruned markdown of a successful fetch
    pub fn fit_content(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { fit_markdown, .. } => fit_markdown.as_deref(),
            FetchOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Failure { error } => Some(error),
        }
    }

    /// Attempts after the first one
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Character count of the untruncated raw content (0 on failure)
    pub fn raw_chars(&self) -> usize {
        self.content().map(|c| c.chars().count()).unwrap_or(0)
    }
}

/// Per-fetch retry bookkeeping
#[derive(Debug, Default, Clone, Copy)]
struct RetryState {
    attempt: u32,
    total_backoff: Duration,
}

/// Delay slept after failed attempt number `attempt` (1-based)
///
/// `base * 2^(attempt-1)`: with a 0.5s base, 0.5s after the first failure,
/// 1.0s after the second.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

enum AttemptOutcome {
    Success {
        status_code: Option<u16>,
        raw_markdown: String,
        fit_markdown: Option<String>,
    },
    Terminal {
        status_code: u16,
        error: String,
    },
    Retryable(String),
}

/// Fetches single URLs through a shared renderer and gate
pub struct Fetcher {
    renderer: Arc<dyn PageRenderer>,
    gate: ConcurrencyGate,
    render_config: RenderConfig,
    request_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Fetcher {
    /// Creates a fetcher with its own gate sized from `config`
    pub fn new(renderer: Arc<dyn PageRenderer>, config: &FetcherConfig) -> Self {
        Self {
            renderer,
            gate: ConcurrencyGate::new(config.semaphore_limit),
            render_config: RenderConfig::from(config),
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries.max(1),
            retry_backoff: config.retry_backoff(),
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Fetches one URL, retrying retryable failures
    ///
    /// # Outcome Classification
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Status >= 400 | Terminal failure, no further attempts |
    /// | Renderer reports failure | Retry |
    /// | Renderer succeeds without content | Retry |
    /// | Deadline elapses | Retry, "Timeout (N ms)" |
    /// | Transport/service error | Retry, "Category: message" |
    /// | Content returned | Success |
    ///
    /// After the last attempt the failure carries the last recorded error and
    /// no status code.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResult {
        let url = request.as_str();
        let started = Instant::now();
        let mut retry = RetryState::default();
        let mut last_error = String::from("No fetch attempt was made");

        while retry.attempt < self.max_retries {
            retry.attempt += 1;
            let (outcome, attempt_elapsed) = self.attempt(request).await;

            match outcome {
                AttemptOutcome::Success {
                    status_code,
                    raw_markdown,
                    fit_markdown,
                } => {
                    tracing::debug!(
                        "Fetched {} on attempt {} ({} chars, {} ms)",
                        url,
                        retry.attempt,
                        raw_markdown.len(),
                        attempt_elapsed.as_millis()
                    );
                    return FetchResult::success(
                        url,
                        raw_markdown,
                        fit_markdown,
                        status_code,
                        millis(attempt_elapsed),
                        retry.attempt,
                    );
                }
                AttemptOutcome::Terminal { status_code, error } => {
                    tracing::warn!("{}", error);
                    return FetchResult::failure(
                        url,
                        error,
                        Some(status_code),
                        millis(attempt_elapsed),
                        retry.attempt,
                    );
                }
                AttemptOutcome::Retryable(error) => {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        retry.attempt,
                        self.max_retries,
                        url,
                        error
                    );
                    last_error = error;
                }
            }

            if retry.attempt < self.max_retries {
                let delay = backoff_delay(self.retry_backoff, retry.attempt);
                retry.total_backoff += delay;
                tracing::debug!("Retrying {} in {:?}", url, delay);
                tokio::time::sleep(delay).await;
            }
        }

        tracing::warn!(
            "Giving up on {} after {} attempts ({:?} backoff): {}",
            url,
            retry.attempt,
            retry.total_backoff,
            last_error
        );
        FetchResult::failure(url, last_error, None, millis(started.elapsed()), retry.attempt)
    }

    /// One gated, deadline-bounded render call
    async fn attempt(&self, request: &FetchRequest) -> (AttemptOutcome, Duration) {
        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return (
                    AttemptOutcome::Retryable(format!("GateClosed: {}", e)),
                    Duration::ZERO,
                )
            }
        };

        let started = Instant::now();
        let render = AssertUnwindSafe(self.renderer.render(request, &self.render_config)).catch_unwind();
        let result = tokio::time::timeout(self.request_timeout, render).await;
        let elapsed = started.elapsed();
        drop(permit);

        let outcome = match result {
            Err(_) => AttemptOutcome::Retryable(format!(
                "Timeout ({} ms)",
                self.request_timeout.as_millis()
            )),
            Ok(Err(_panic)) => AttemptOutcome::Retryable("Panic: renderer panicked".to_string()),
            Ok(Ok(Err(e))) => AttemptOutcome::Retryable(format!("{}: {}", e.category(), e)),
            Ok(Ok(Ok(output))) => classify(request, output),
        };

        (outcome, elapsed)
    }
}

fn classify(request: &FetchRequest, output: RenderOutput) -> AttemptOutcome {
    if let Some(status) = output.status_code.filter(|s| *s >= 400) {
        return AttemptOutcome::Terminal {
            status_code: status,
            error: format!("HTTP {} for {}", status, request),
        };
    }

    if !output.success {
        let error = output
            .error_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Render failed without an error message".to_string());
        return AttemptOutcome::Retryable(error);
    }

    match output.raw_markdown {
        Some(raw) if !raw.trim().is_empty() => AttemptOutcome::Success {
            status_code: output.status_code,
            raw_markdown: raw,
            fit_markdown: output.fit_markdown.filter(|f| !f.trim().is_empty()),
        },
        _ => AttemptOutcome::Retryable("Empty content".to_string()),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
