use crate::url::FetchRequest;
use crate::UrlError;
use url::{Host, Url};

/// Validates a user- or search-supplied URL and turns it into a `FetchRequest`
///
/// # Validation Steps
///
/// 1. Trim surrounding whitespace; reject empty input
/// 2. Reject an explicit scheme other than http/https
/// 3. Prepend `https://` when no scheme is given
/// 4. Reject embedded whitespace
/// 5. Parse; reject malformed input
/// 6. Require a host that is a dotted domain, `localhost`, or an IPv4 address
///
/// # Arguments
///
/// * `raw` - The URL string to validate
///
/// # Returns
///
/// * `Ok(FetchRequest)` - The validated request
/// * `Err(UrlError)` - The input cannot be fetched
///
/// # Examples
///
/// ```
/// use deep_research::url::validate_url;
///
/// let request = validate_url("example.com/page").unwrap();
/// assert_eq!(request.as_str(), "https://example.com/page");
/// ```
pub fn validate_url(raw: &str) -> Result<FetchRequest, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    if let Some((scheme, _)) = trimmed.split_once("://") {
        let looks_like_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if looks_like_scheme
            && !scheme.eq_ignore_ascii_case("http")
            && !scheme.eq_ignore_ascii_case("https")
        {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                scheme
            )));
        }
    }

    let candidate = if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    if candidate.chars().any(char::is_whitespace) {
        return Err(UrlError::Malformed(format!(
            "URL contains whitespace: {}",
            trimmed
        )));
    }

    let url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host() {
        None => return Err(UrlError::MissingDomain),
        Some(Host::Ipv4(_)) => {}
        Some(Host::Ipv6(addr)) => {
            return Err(UrlError::Malformed(format!(
                "IPv6 hosts are not supported: {}",
                addr
            )))
        }
        Some(Host::Domain(domain)) => {
            if !is_valid_domain(domain) {
                return Err(UrlError::Malformed(format!("Invalid host: {}", domain)));
            }
        }
    }

    Ok(FetchRequest::new(candidate, url))
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// A dotted domain with a 2+ letter TLD, or `localhost`
fn is_valid_domain(domain: &str) -> bool {
    if domain.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let label_ok = |label: &&str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    };

    let tld = labels[labels.len() - 1];
    labels.iter().all(label_ok)
        && tld.len() >= 2
        && (tld.chars().all(|c| c.is_ascii_alphabetic()) || tld.starts_with("xn--"))
}
