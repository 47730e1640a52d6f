//! HTTP API request/response types

use serde::{Deserialize, Serialize};

pub const MAX_TOPIC_CHARS: usize = 500;
pub const MAX_MODEL_CHARS: usize = 100;
pub const MAX_QUERIES: usize = 10;
pub const MAX_RESULTS_PER_QUERY: usize = 10;

/// Body of `POST /api/research`
///
/// Omitted fields fall back to the server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub num_queries: Option<usize>,
    #[serde(default)]
    pub results_per_query: Option<usize>,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            model: None,
            num_queries: None,
            results_per_query: None,
        }
    }

    /// Checks field ranges; the message is suitable for a 400 response
    pub fn validate(&self) -> Result<(), String> {
        if self.topic.trim().is_empty() {
            return Err("Topic cannot be empty".to_string());
        }
        if self.topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(format!("Topic must be at most {} characters", MAX_TOPIC_CHARS));
        }
        if let Some(model) = &self.model {
            let len = model.chars().count();
            if len == 0 || len > MAX_MODEL_CHARS {
                return Err(format!("Model must be 1-{} characters", MAX_MODEL_CHARS));
            }
        }
        if let Some(n) = self.num_queries {
            if !(1..=MAX_QUERIES).contains(&n) {
                return Err(format!("num_queries must be between 1 and {}", MAX_QUERIES));
            }
        }
        if let Some(n) = self.results_per_query {
            if !(1..=MAX_RESULTS_PER_QUERY).contains(&n) {
                return Err(format!(
                    "results_per_query must be between 1 and {}",
                    MAX_RESULTS_PER_QUERY
                ));
            }
        }
        Ok(())
    }
}

/// Returned when a job is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: String,
    pub status: String,
    pub topic: String,
    pub created_at: String,
}

/// Full job status with counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub topic: String,
    pub created_at: String,
    pub report_id: Option<String>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub urls_found: usize,
    pub pages_scraped: usize,
    pub pages_failed: usize,
}

impl From<JobStatusResponse> for JobResponse {
    fn from(status: JobStatusResponse) -> Self {
        Self {
            job_id: status.job_id,
            status: status.status,
            topic: status.topic,
            created_at: status.created_at,
        }
    }
}

/// Stored report metadata, also the listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub topic: String,
    pub created_at: String,
    #[serde(default)]
    pub urls_found: usize,
    #[serde(default)]
    pub pages_scraped: usize,
    #[serde(default)]
    pub pages_failed: usize,
    #[serde(default)]
    pub elapsed_ms: u64,
    /// Size of the markdown file in bytes
    #[serde(default)]
    pub file_size: u64,
}

/// Report metadata plus the markdown itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDetail {
    #[serde(flatten)]
    pub summary: ReportSummary,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub ollama_reachable: bool,
    pub ollama_models: Vec<String>,
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
