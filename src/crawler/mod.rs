//! Crawler module for page fetching
//!
//! This module contains the concurrent fetch core:
//! - A concurrency gate shared by all fetches of one run
//! - The fetch worker with per-attempt deadlines and retry/backoff
//! - The coordinator that fans out fetches and reports progress
//! - The page renderer interface and its HTTP implementation

mod coordinator;
mod fetcher;
mod gate;
mod http_renderer;
mod markdown;
mod renderer;

pub use coordinator::FetchCoordinator;
pub use fetcher::{backoff_delay, FetchOutcome, FetchResult, Fetcher};
pub use gate::{ConcurrencyGate, GatePermit};
pub use http_renderer::{build_http_client, HttpRenderer};
pub use markdown::{html_to_markdown, ExtractOptions, MarkdownDocument};
pub use renderer::{PageRenderer, RenderConfig, RenderError, RenderOutput};
