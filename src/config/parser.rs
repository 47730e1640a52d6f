use crate::config::types::{CacheMode, Config};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use deep_research::config::load_config;
///
/// let config = load_config(Path::new("research.toml")).unwrap();
/// println!("Concurrency: {}", config.fetcher.semaphore_limit);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a report can be traced back to the settings that
/// produced it.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Builds the effective configuration for this process
///
/// Starts from the defaults (or the TOML file when `path` is given), then
/// applies environment overrides and validates the result. The returned hash
/// is `None` when no file was read.
pub fn resolve_config(path: Option<&Path>) -> Result<(Config, Option<String>), ConfigError> {
    let (mut config, hash) = match path {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)?;
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;

    Ok((config, hash))
}

/// Applies environment-variable overrides to `config`
///
/// `lookup` returns the raw value of a variable, if set. Values that fail to
/// parse leave the current setting untouched.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let fetcher = &mut config.fetcher;
    override_parsed(&lookup, "SCRAPER_PAGE_TIMEOUT", &mut fetcher.page_timeout_ms);
    override_parsed(&lookup, "SCRAPER_REQUEST_TIMEOUT", &mut fetcher.request_timeout_ms);
    override_parsed(&lookup, "SCRAPER_PRUNING_THRESHOLD", &mut fetcher.pruning_threshold);
    override_parsed(&lookup, "SCRAPER_MAX_RETRIES", &mut fetcher.max_retries);
    override_parsed(&lookup, "SCRAPER_SEMAPHORE_LIMIT", &mut fetcher.semaphore_limit);
    override_parsed::<CacheMode, _>(&lookup, "CACHE_MODE", &mut fetcher.cache_mode);

    let searcher = &mut config.searcher;
    override_string(&lookup, "OLLAMA_MODEL", &mut searcher.model);
    override_string(&lookup, "OLLAMA_HOST", &mut searcher.ollama_host);
    override_parsed(&lookup, "OLLAMA_TIMEOUT", &mut searcher.ollama_timeout_secs);
    override_parsed(&lookup, "SEARCH_NUM_QUERIES", &mut searcher.num_queries);
    override_parsed(&lookup, "SEARCH_RESULTS_PER_QUERY", &mut searcher.results_per_query);
    override_string(&lookup, "SEARCH_REGION", &mut searcher.region);
    override_string(&lookup, "SEARCH_SAFESEARCH", &mut searcher.safesearch);
    override_parsed(&lookup, "MAX_CONCURRENT_SEARCHES", &mut searcher.max_concurrent_searches);
    if let Some(value) = lookup("SEARCH_TIMELIMIT") {
        let value = value.trim();
        searcher.timelimit = if value.is_empty() || value.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(value.to_string())
        };
    }

    override_string(&lookup, "WEB_HOST", &mut config.server.host);
    override_parsed(&lookup, "WEB_PORT", &mut config.server.port);

    override_string(&lookup, "OUTPUT_FILE", &mut config.output.report_path);
}

/// Returns true when the `VERBOSE` variable asks for debug output
pub fn env_verbose<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("VERBOSE")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!("Ignoring unparsable {}={:?}", key, raw),
        }
    }
}

fn override_string<F>(lookup: &F, key: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        let raw = raw.trim();
        if !raw.is_empty() {
            *target = raw.to_string();
        }
    }
}
