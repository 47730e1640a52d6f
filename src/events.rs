//! Progress events emitted while a research run is in flight
//!
//! Events flow one way: the pipeline pushes them into a `ProgressSink` and
//! forgets them. Retention and fan-out belong to whoever owns the sink (the
//! CLI logs them, the web service records and broadcasts them per job).

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A single progress notification
///
/// Serialized adjacently tagged so the `event` name and the `data` payload
/// map directly onto a server-sent event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The language model produced these queries
    Queries { queries: Vec<String> },

    /// A new unique URL was discovered by a search
    UrlFound {
        url: String,
        title: String,
        query: String,
    },

    /// One fetch finished (successfully or not)
    ScrapeProgress {
        url: String,
        success: bool,
        chars: usize,
        elapsed_ms: u64,
        completed: usize,
        total: usize,
    },

    /// A phase transition
    Status { status: String, message: String },

    /// The run finished and a report is available
    Complete {
        report_id: Option<String>,
        elapsed_ms: u64,
        urls_found: usize,
        pages_scraped: usize,
        pages_failed: usize,
    },

    /// The run failed
    Error { message: String },
}

impl ProgressEvent {
    pub fn status(status: impl Into<String>, message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            status: status.into(),
            message: message.into(),
        }
    }

    /// Event name as used on the wire
    pub fn event_name(&self) -> &'static str {
        match self {
            ProgressEvent::Queries { .. } => "queries",
            ProgressEvent::UrlFound { .. } => "url_found",
            ProgressEvent::ScrapeProgress { .. } => "scrape_progress",
            ProgressEvent::Status { .. } => "status",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }

    /// JSON payload without the event name
    pub fn data_json(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        let data = value
            .get_mut("data")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        serde_json::to_string(&data)
    }
}

/// Receiver of progress events
///
/// Emission must not block; sinks that forward to slower consumers buffer or
/// drop.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // receiver gone means nobody is listening anymore
        let _ = self.send(event);
    }
}

/// Sink that keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
