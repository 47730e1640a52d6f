//! Parsing free-form language model output into a list of queries

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("valid fence pattern"));

static EMBEDDED_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*?\]").expect("valid array pattern"));

static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\d+[.)]\s*(.+)$").expect("valid numbered pattern"));

/// Extracts query strings from model output
///
/// Tried in order, first hit wins:
/// 1. the whole (fence-stripped) text as a JSON array
/// 2. the first JSON array embedded in the text
/// 3. a numbered list (`1. query` or `1) query`)
/// 4. non-empty lines that do not start with a bracket or brace
///
/// Returns an empty list when nothing usable is found.
///
/// # Examples
///
/// ```
/// use deep_research::search::parse_queries;
///
/// let queries = parse_queries("```json\n[\"rust async\", \"tokio runtime\"]\n```");
/// assert_eq!(queries, vec!["rust async", "tokio runtime"]);
/// ```
pub fn parse_queries(raw: &str) -> Vec<String> {
    let without_fences = CODE_FENCE.replace_all(raw, "");
    let cleaned = without_fences.trim().trim_end_matches('`').trim();

    if let Some(queries) = json_array(cleaned) {
        return queries;
    }

    if let Some(found) = EMBEDDED_ARRAY.find(cleaned) {
        if let Some(queries) = json_array(found.as_str()) {
            return queries;
        }
    }

    let numbered: Vec<String> = NUMBERED_ITEM
        .captures_iter(cleaned)
        .filter_map(|caps| caps.get(1))
        .map(|m| strip_quotes(m.as_str()))
        .collect();
    if !numbered.is_empty() {
        return numbered;
    }

    cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['{', '[', ']', '}']))
        .map(strip_quotes)
        .filter(|line| !line.is_empty())
        .collect()
}

fn json_array(text: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string().trim().to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim().trim_matches(['"', '\'']).trim().to_string()
}
