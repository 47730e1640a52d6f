//! Content sanitizing and truncation
//!
//! Every string that originates from a remote page (content, URLs, error
//! messages) passes through `sanitize_markdown` before it is placed in a
//! report, so the report stays safe to render as HTML.

use regex::Regex;
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

static JAVASCRIPT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[([^\]]*)\]\(\s*javascript:(?:[^()]|\([^()]*\))*\)")
        .expect("valid link pattern")
});

/// Strips HTML tags and `javascript:` markdown links
///
/// Tags are removed outright; a `[text](javascript:...)` link is replaced by
/// its text (one level of parentheses inside the target is allowed, as in
/// `javascript:alert(1)`). Passes repeat until nothing changes, so removing one fragment can
/// never assemble a new one and `sanitize(sanitize(x)) == sanitize(x)`.
///
/// # Examples
///
/// ```
/// use deep_research::output::sanitize_markdown;
///
/// assert_eq!(sanitize_markdown("[click](javascript:alert(1))"), "click");
/// assert_eq!(sanitize_markdown("a <b>bold</b> move"), "a bold move");
/// ```
pub fn sanitize_markdown(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let without_tags = HTML_TAG.replace_all(&current, "");
        let next = JAVASCRIPT_LINK.replace_all(&without_tags, "$1").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Returns at most `max_chars` characters of `text`
///
/// Cuts on a character boundary, never inside a multi-byte sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
