//! Markdown report assembly
//!
//! This module renders an aggregated run into the final research report:
//! a header with aggregate counts, a table of contents, one section per
//! scraped source, and the list of failed URLs.

use crate::output::aggregate::AggregateReport;
use crate::output::sanitize::sanitize_markdown;
use std::path::{Path, PathBuf};

/// Formats an aggregated run as a markdown report
///
/// Deterministic for identical inputs. Every interpolated string is
/// sanitized first. The length shown per source is the character count of
/// the stored (already truncated) content.
///
/// # Arguments
///
/// * `topic` - The research topic
/// * `urls` - Every URL the run attempted
/// * `successes` - URL -> stored content, in the order sections appear
/// * `errors` - URL -> error message
/// * `elapsed_ms` - Total run time
///
/// # Returns
///
/// The report as a markdown string
pub fn assemble_report(
    topic: &str,
    urls: &[String],
    successes: &[(String, String)],
    errors: &[(String, String)],
    elapsed_ms: u64,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    // Header
    sections.push(format!("# Research Report: {}\n", sanitize_markdown(topic)));
    sections.push(format!(
        "> Auto-generated by Deep Research\n\
         > URLs searched: {} | Scraped: {} | Failed: {} | Time: {} ms\n",
        urls.len(),
        successes.len(),
        errors.len(),
        elapsed_ms
    ));
    sections.push("---\n".to_string());

    // Table of contents
    if !successes.is_empty() {
        sections.push("## Table of Contents\n".to_string());
        for (i, (url, _)) in successes.iter().enumerate() {
            let n = i + 1;
            sections.push(format!("{}. [{}](#source-{})", n, sanitize_markdown(url), n));
        }
        sections.push("\n---\n".to_string());
    }

    // One section per source
    for (i, (url, content)) in successes.iter().enumerate() {
        let n = i + 1;
        sections.push(format!("## <a id=\"source-{}\"></a>Source {}\n", n, n));
        sections.push(format!("**URL:** {}\n", sanitize_markdown(url)));
        sections.push(format!(
            "**Length:** {} characters\n",
            format_thousands(content.chars().count())
        ));
        sections.push(sanitize_markdown(content.trim()));
        sections.push("\n\n---\n".to_string());
    }

    // Failures
    if !errors.is_empty() {
        sections.push("## Failed URLs\n".to_string());
        for (url, error) in errors {
            sections.push(format!(
                "- **{}**: {}",
                sanitize_markdown(url),
                sanitize_markdown(error)
            ));
        }
        sections.push("\n".to_string());
    }

    sections.join("\n")
}

/// Formats an `AggregateReport` for `topic`
pub fn format_aggregate_report(topic: &str, report: &AggregateReport) -> String {
    assemble_report(
        topic,
        report.urls(),
        report.successes(),
        report.errors(),
        report.elapsed_ms(),
    )
}

/// Writes a report to disk, creating parent directories
///
/// # Returns
///
/// * `Ok(PathBuf)` - The absolute path of the written file
/// * `Err(std::io::Error)` - Failed to create directories or write the file
pub fn save_report(content: &str, path: &Path) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    path.canonicalize()
}

/// `1234567` -> `"1,234,567"`
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
