use crate::config::types::{Config, FetcherConfig, OutputConfig, SearcherConfig, ServerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_searcher_config(&config.searcher)?;
    validate_server_config(&config.server)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.semaphore_limit < 1 || config.semaphore_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "semaphore_limit must be between 1 and 100, got {}",
            config.semaphore_limit
        )));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.page_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "page_timeout_ms must be >= 100ms, got {}ms",
            config.page_timeout_ms
        )));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if !config.retry_backoff_secs.is_finite()
        || config.retry_backoff_secs < 0.0
        || config.retry_backoff_secs > 60.0
    {
        return Err(ConfigError::Validation(format!(
            "retry_backoff_secs must be between 0 and 60, got {}",
            config.retry_backoff_secs
        )));
    }

    if config.max_content_chars < 1 {
        return Err(ConfigError::Validation(
            "max_content_chars must be >= 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.pruning_threshold) {
        return Err(ConfigError::Validation(format!(
            "pruning_threshold must be between 0 and 1, got {}",
            config.pruning_threshold
        )));
    }

    if let Some(tag) = config
        .excluded_tags
        .iter()
        .find(|t| t.is_empty() || !t.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return Err(ConfigError::Validation(format!(
            "excluded_tags contains an invalid tag name '{}'",
            tag
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates query generation and search configuration
fn validate_searcher_config(config: &SearcherConfig) -> Result<(), ConfigError> {
    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("model cannot be empty".to_string()));
    }

    let host = Url::parse(&config.ollama_host)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.ollama_host, e)))?;
    if host.scheme() != "http" && host.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "ollama_host must use http or https: {}",
            config.ollama_host
        )));
    }

    if config.ollama_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "ollama_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.num_queries < 1 || config.num_queries > 10 {
        return Err(ConfigError::Validation(format!(
            "num_queries must be between 1 and 10, got {}",
            config.num_queries
        )));
    }

    if config.results_per_query < 1 || config.results_per_query > 50 {
        return Err(ConfigError::Validation(format!(
            "results_per_query must be between 1 and 50, got {}",
            config.results_per_query
        )));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "temperature must be between 0 and 2, got {}",
            config.temperature
        )));
    }

    if !matches!(config.safesearch.as_str(), "on" | "moderate" | "off") {
        return Err(ConfigError::Validation(format!(
            "safesearch must be one of on, moderate, off; got '{}'",
            config.safesearch
        )));
    }

    if let Some(limit) = &config.timelimit {
        if !matches!(limit.as_str(), "d" | "w" | "m" | "y") {
            return Err(ConfigError::Validation(format!(
                "timelimit must be one of d, w, m, y; got '{}'",
                limit
            )));
        }
    }

    if config.max_concurrent_searches < 1 {
        return Err(ConfigError::Validation(
            "max_concurrent_searches must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates web service configuration
fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Validation("host cannot be empty".to_string()));
    }

    if config.reports_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "reports_dir cannot be empty".to_string(),
        ));
    }

    if config.max_jobs < 1 {
        return Err(ConfigError::Validation("max_jobs must be >= 1".to_string()));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.report_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "report_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
