use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for Deep Research
///
/// Every section and every key is optional in the TOML file; missing values
/// take the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub searcher: SearcherConfig,
    pub server: ServerConfig,
    pub output: OutputConfig,
}

/// Page fetching behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Maximum number of fetch attempts holding the gate at once
    pub semaphore_limit: usize,

    /// Deadline for one render attempt (milliseconds)
    pub request_timeout_ms: u64,

    /// Page load timeout handed to the renderer (milliseconds)
    pub page_timeout_ms: u64,

    /// Attempts per URL, including the first one
    pub max_retries: u32,

    /// Base delay for exponential backoff (seconds)
    pub retry_backoff_secs: f64,

    /// Stored content is truncated to this many characters
    pub max_content_chars: usize,

    /// Tags whose subtree is dropped during markdown extraction
    pub excluded_tags: Vec<String>,

    pub cache_mode: CacheMode,

    /// Minimum non-link text ratio for a block to survive pruning
    pub pruning_threshold: f64,

    /// Minimum word count for a block to survive pruning
    pub min_word_threshold: usize,

    pub user_agent: String,
}

impl FetcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_secs)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            semaphore_limit: 6,
            request_timeout_ms: 15_000,
            page_timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_secs: 0.5,
            max_content_chars: 100_000,
            excluded_tags: [
                "nav", "footer", "header", "aside", "form", "iframe", "noscript", "script",
                "style",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            cache_mode: CacheMode::Bypass,
            pruning_threshold: 0.48,
            min_word_threshold: 30,
            user_agent: format!("DeepResearch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Whether the renderer may answer repeated URLs from memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Cache rendered pages for the lifetime of one started renderer
    Enabled,
    /// Always hit the network
    #[default]
    Bypass,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(CacheMode::Enabled),
            "bypass" => Ok(CacheMode::Bypass),
            other => Err(format!("unknown cache mode '{}'", other)),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Enabled => write!(f, "enabled"),
            CacheMode::Bypass => write!(f, "bypass"),
        }
    }
}

/// Query generation and web search settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearcherConfig {
    /// Ollama model used to generate queries
    pub model: String,

    /// Base URL of the Ollama server
    pub ollama_host: String,

    pub ollama_timeout_secs: u64,

    /// Number of queries requested from the model
    pub num_queries: usize,

    pub temperature: f64,

    /// Maximum hits kept per query
    pub results_per_query: usize,

    /// DuckDuckGo region code (e.g. "wt-wt", "us-en")
    pub region: String,

    /// "on", "moderate" or "off"
    pub safesearch: String,

    /// "d", "w", "m" or "y"; unset means no time filter
    pub timelimit: Option<String>,

    pub max_concurrent_searches: usize,
}

impl SearcherConfig {
    pub fn ollama_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama_timeout_secs)
    }
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1:8b-instruct-q8_0".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            ollama_timeout_secs: 60,
            num_queries: 3,
            temperature: 0.7,
            results_per_query: 3,
            region: "wt-wt".to_string(),
            safesearch: "moderate".to_string(),
            timelimit: None,
            max_concurrent_searches: 3,
        }
    }
}

/// Web service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Directory holding `<id>.md` and `<id>.json` report files
    pub reports_dir: String,

    /// Jobs retained in memory before the oldest are evicted
    pub max_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            reports_dir: "reports".to_string(),
            max_jobs: 20,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the markdown report written by the `research` command
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: "final_report.md".to_string(),
        }
    }
}
