//! Configuration module for Deep Research
//!
//! Configuration is layered: built-in defaults, an optional TOML file,
//! environment variables, then command-line flags applied by the binary.
//!
//! # Example
//!
//! ```no_run
//! use deep_research::config::resolve_config;
//! use std::path::Path;
//!
//! let (config, _hash) = resolve_config(Some(Path::new("research.toml"))).unwrap();
//! println!("Fetching with {} slots", config.fetcher.semaphore_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CacheMode, Config, FetcherConfig, OutputConfig, SearcherConfig, ServerConfig};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, env_verbose, load_config, load_config_with_hash,
    resolve_config,
};
pub use validation::validate;
