//! Console summaries printed by the command-line interface

use crate::crawler::FetchResult;
use crate::output::aggregate::AggregateReport;
use crate::output::report::format_thousands;
use crate::search::SearchReport;
use std::path::Path;

const RULE_WIDTH: usize = 64;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Prints the banner shown before a research run
pub fn print_research_banner(topic: &str, model: &str, num_queries: usize, results_per_query: usize) {
    println!("\n{}", rule());
    println!("  RESEARCH");
    println!("  Topic   : {}", topic);
    println!("  Model   : {}", model);
    println!("  Queries : {} x {} results each", num_queries, results_per_query);
    println!("{}\n", rule());
}

/// Prints the end-of-run summary followed by every failed URL
pub fn print_research_summary(report: &AggregateReport, report_chars: usize, saved_to: &Path) {
    println!("\n{}", rule());
    println!("  PIPELINE COMPLETE");
    println!("  Total time     : {} ms", format_thousands(report.elapsed_ms() as usize));
    println!("  URLs found     : {}", report.urls().len());
    println!("  Pages scraped  : {}", report.pages_scraped());
    println!("  Failed         : {}", report.pages_failed());
    println!("  Report chars   : {}", format_thousands(report_chars));
    println!("  Saved to       : {}", saved_to.display());
    println!("{}\n", rule());

    if !report.errors().is_empty() {
        println!("  Failed URLs:");
        for (url, error) in report.errors() {
            println!("    - {}: {}", url, error);
        }
        println!();
    }
}

/// Prints generated queries and unique URLs, plus every hit when `detailed`
pub fn print_search_report(report: &SearchReport, detailed: bool) {
    println!("\n{}", rule());
    println!("  TOPIC : {}", report.topic);
    println!("  TIME  : {} ms", format_thousands(report.elapsed_ms as usize));
    println!("{}", rule());

    println!("\n  GENERATED QUERIES:");
    for (i, query) in report.queries.iter().enumerate() {
        println!("      {}. {}", i + 1, query);
    }

    println!("\n  UNIQUE URLs ({}):", report.unique_urls.len());
    for (i, url) in report.unique_urls.iter().enumerate() {
        println!("      {:>2}. {}", i + 1, url);
    }

    if detailed && !report.results.is_empty() {
        println!("\n  DETAILED RESULTS ({}):", report.results.len());
        for result in &report.results {
            println!("      [{}]", result.source_query);
            println!("        {}", result.title);
            println!("        {}", result.url);
            println!("        {}", shorten(&result.snippet, 120));
            println!();
        }
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// One-line-per-field summary of a single fetch
pub fn format_fetch_summary(result: &FetchResult, saved_to: Option<&Path>) -> String {
    let mut lines = vec![
        format!("URL          : {}", result.url),
        format!(
            "Status       : {}",
            result
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("Attempts     : {}", result.attempts),
        format!("Elapsed      : {} ms", format_thousands(result.elapsed_ms as usize)),
        format!("Raw chars    : {}", format_thousands(result.raw_chars())),
    ];
    if let Some(fit) = result.fit_content() {
        lines.push(format!("Fit chars    : {}", format_thousands(fit.chars().count())));
    }
    if let Some(path) = saved_to {
        lines.push(format!("Saved to     : {}", path.display()));
    }
    lines.join("\n")
}
