//! Report persistence
//!
//! Each report is two files in the reports directory: `<id>.md` holding the
//! markdown and `<id>.json` holding its `ReportSummary`. IDs are restricted
//! to short lowercase hex strings so they can never escape the directory.

use crate::output::AggregateReport;
use crate::server::types::{ReportDetail, ReportSummary};
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static VALID_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{6,16}$").expect("valid report id pattern"));

/// Report store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid report ID: {0:?}")]
    InvalidId(String),

    #[error("Report IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Report metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub fn is_valid_id(id: &str) -> bool {
    VALID_ID.is_match(id)
}

/// Directory-backed store of finished reports
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn markdown_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.md"))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Writes the markdown and its metadata, replacing any previous report
    /// with the same ID
    pub fn save(
        &self,
        id: &str,
        topic: &str,
        markdown: &str,
        report: &AggregateReport,
    ) -> Result<ReportSummary, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        fs::create_dir_all(&self.dir)?;

        fs::write(self.markdown_path(id), markdown)?;

        let summary = ReportSummary {
            id: id.to_string(),
            topic: topic.to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            urls_found: report.urls().len(),
            pages_scraped: report.pages_scraped(),
            pages_failed: report.pages_failed(),
            elapsed_ms: report.elapsed_ms(),
            file_size: markdown.len() as u64,
        };
        fs::write(self.metadata_path(id), serde_json::to_string_pretty(&summary)?)?;

        tracing::info!("Saved report {} ({} bytes)", id, summary.file_size);
        Ok(summary)
    }

    /// Every readable report, newest first
    ///
    /// Metadata files that cannot be read or parsed are skipped. A missing
    /// directory is an empty store.
    pub fn list(&self) -> Result<Vec<ReportSummary>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reports = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_summary(&path) {
                Ok(summary) => reports.push(summary),
                Err(e) => tracing::warn!("Skipping report metadata {}: {}", path.display(), e),
            }
        }

        reports.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(reports)
    }

    /// One report with content; `None` for unknown or invalid IDs
    pub fn get(&self, id: &str) -> Result<Option<ReportDetail>, StoreError> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let metadata_path = self.metadata_path(id);
        let markdown_path = self.markdown_path(id);
        if !metadata_path.exists() || !markdown_path.exists() {
            return Ok(None);
        }

        let summary = read_summary(&metadata_path)?;
        let content = fs::read_to_string(markdown_path)?;
        Ok(Some(ReportDetail { summary, content }))
    }

    /// Removes both files; `true` when anything was deleted
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        let mut deleted = false;
        for path in [self.metadata_path(id), self.markdown_path(id)] {
            match fs::remove_file(&path) {
                Ok(()) => deleted = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if deleted {
            tracing::info!("Deleted report {}", id);
        }
        Ok(deleted)
    }
}

fn read_summary(path: &Path) -> Result<ReportSummary, StoreError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
