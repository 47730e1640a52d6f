//! Output module for turning fetch results into reports
//!
//! This module handles:
//! - Sanitizing and truncating untrusted page content
//! - Aggregating fetch results into success and failure maps
//! - Assembling and saving the markdown report
//! - Console summaries for the CLI

mod aggregate;
mod report;
mod sanitize;
pub mod summary;

pub use aggregate::{AggregateReport, Aggregator};
pub use report::{assemble_report, format_aggregate_report, format_thousands, save_report};
pub use sanitize::{sanitize_markdown, truncate_chars};
