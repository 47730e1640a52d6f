//! Web search providers

use crate::search::SearchError;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// One web search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub region: String,
    pub safesearch: String,
    pub timelimit: Option<String>,
    pub max_results: usize,
}

/// A single hit returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Synchronous web search backend
///
/// Implementations may block; callers run them on the blocking pool.
pub trait SearchProvider: Send + Sync {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError>;
}

/// DuckDuckGo's HTML (no-JavaScript) search
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    endpoint: String,
    user_agent: String,
    timeout: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self::with_endpoint(DDG_HTML_ENDPOINT, user_agent, timeout)
    }

    /// Points the provider at another endpoint serving the same HTML
    pub fn with_endpoint(endpoint: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// DuckDuckGo's `kp` parameter for a safesearch level
fn safesearch_param(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "on" => "1",
        "off" => "-2",
        _ => "-1",
    }
}

impl SearchProvider for DuckDuckGoSearch {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        // The blocking client owns a runtime of its own, so it is built on
        // the calling (blocking) thread rather than stored.
        let client = reqwest::blocking::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|e| SearchError::Provider(e.to_string()))?;

        let mut form = vec![
            ("q", query.text.as_str()),
            ("kl", query.region.as_str()),
            ("kp", safesearch_param(&query.safesearch)),
        ];
        if let Some(limit) = query.timelimit.as_deref() {
            form.push(("df", limit));
        }

        let response = client
            .post(&self.endpoint)
            .header("Accept", "text/html")
            .form(&form)
            .send()
            .map_err(|e| SearchError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Provider(format!(
                "DuckDuckGo returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body = response
            .text()
            .map_err(|e| SearchError::Provider(e.to_string()))?;
        Ok(parse_ddg_html(&body, query.max_results))
    }
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts up to `max` organic results from a DuckDuckGo HTML page
///
/// Ads and results without an http(s) destination are skipped.
pub fn parse_ddg_html(html: &str, max: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let result_sel = selector(".result");
    let link_sel = selector("a.result__a");
    let snippet_sel = selector("a.result__snippet, .result__snippet");

    document
        .select(&result_sel)
        .filter(|result| !result.value().classes().any(|c| c == "result--ad"))
        .filter_map(|result| {
            let link = result.select(&link_sel).next()?;
            let url = extract_ddg_url(link.value().attr("href")?);
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return None;
            }
            let snippet = result
                .select(&snippet_sel)
                .next()
                .map(element_text)
                .unwrap_or_default();
            Some(SearchHit {
                title: element_text(link),
                url,
                snippet,
            })
        })
        .take(max)
        .collect()
}

/// Unwraps DuckDuckGo redirect links
///
/// `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...` yields
/// `https://example.com`; anything else is returned unchanged.
pub fn extract_ddg_url(href: &str) -> String {
    let query = href.split_once('?').map(|(_, q)| q).unwrap_or(href);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == "uddg" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| href.to_string())
}
