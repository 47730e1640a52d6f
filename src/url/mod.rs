//! URL handling module for Deep Research
//!
//! Validation turns untrusted strings (search hits, CLI arguments) into
//! `FetchRequest` values before any network attempt is made.

mod validate;

use std::fmt;
use url::Url;

pub use validate::validate_url;

/// A validated absolute http(s) URL, ready to be fetched
///
/// Only `validate_url` creates these, so holding one proves the scheme and
/// host checks already passed. The caller's spelling (trimmed, scheme
/// prepended if missing) is kept for keys and display; the parsed form is
/// what goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    original: String,
    url: Url,
}

impl FetchRequest {
    pub(crate) fn new(original: String, url: Url) -> Self {
        Self { original, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Host portion of the URL, for logging
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Key used to decide whether two discovered URLs are the same page
///
/// Lowercases the URL and strips trailing slashes, so
/// `https://Example.com/Docs/` and `https://example.com/docs` collide.
///
/// # Examples
///
/// ```
/// use deep_research::url::dedup_key;
///
/// assert_eq!(dedup_key("https://Example.com/Docs/"), "https://example.com/docs");
/// ```
pub fn dedup_key(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}
