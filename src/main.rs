//! Deep Research main entry point
//!
//! This is the command-line interface for the Deep Research pipeline.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use deep_research::config::{env_verbose, resolve_config, validate, Config};
use deep_research::crawler::{Fetcher, HttpRenderer, PageRenderer};
use deep_research::output::{format_aggregate_report, save_report, summary};
use deep_research::pipeline::{run_research, Collaborators};
use deep_research::search::Searcher;
use deep_research::server;
use deep_research::url::validate_url;
use deep_research::{ProgressEvent, ProgressSink};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Deep Research: topic in, markdown report out
///
/// Generates search queries with a local Ollama model, searches DuckDuckGo,
/// fetches every result with bounded concurrency and retries, and compiles
/// the pages into a single markdown report.
#[derive(Parser, Debug)]
#[command(name = "deep-research")]
#[command(version)]
#[command(about = "Local research agent: queries, search, scrape, report", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write a report
    Research {
        /// Research topic; prompted for when omitted
        topic: Option<String>,

        /// Output path for the report
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Generate queries and list the URLs they find
    Search {
        /// Research topic; prompted for when omitted
        topic: Option<String>,

        #[command(flatten)]
        search: SearchArgs,

        /// Time filter: d(ay), w(eek), m(onth), y(ear)
        #[arg(short, long, value_parser = ["d", "w", "m", "y"])]
        timelimit: Option<String>,
    },

    /// Fetch one page and extract markdown
    Fetch {
        /// URL to fetch; prompted for when omitted
        url: Option<String>,

        /// Where to write the markdown
        #[arg(short, long, default_value = "output.md")]
        output: PathBuf,

        /// Use the pruned markdown instead of the raw one
        #[arg(long)]
        fit: bool,

        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print markdown to stdout instead of writing a file
        #[arg(long)]
        no_save: bool,
    },

    /// Run the web service
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Ollama model name
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama server URL
    #[arg(long)]
    host: Option<String>,

    /// Number of search queries to generate
    #[arg(short, long)]
    num_queries: Option<usize>,

    /// Results kept per search query
    #[arg(long)]
    top: Option<usize>,
}

impl SearchArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.searcher.model = model.clone();
        }
        if let Some(host) = &self.host {
            config.searcher.ollama_host = host.clone();
        }
        if let Some(n) = self.num_queries {
            config.searcher.num_queries = n;
        }
        if let Some(n) = self.top {
            config.searcher.results_per_query = n;
        }
    }
}

/// Logs progress events for interactive runs
struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Queries { queries } => {
                for (i, query) in queries.iter().enumerate() {
                    tracing::info!("Query {}: {}", i + 1, query);
                }
            }
            ProgressEvent::UrlFound { url, .. } => tracing::debug!("Found {}", url),
            ProgressEvent::Status { message, .. } => tracing::info!("{}", message),
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let verbose = if cli.verbose == 0 && env_verbose(|key| std::env::var(key).ok()) {
        1
    } else {
        cli.verbose
    };
    setup_logging(verbose, cli.quiet);

    match run(cli, verbose).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("deep_research=info,warn"),
            1 => EnvFilter::new("deep_research=debug,info"),
            2 => EnvFilter::new("deep_research=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(io::stderr)
        .init();
}

/// Loads file and environment configuration
fn load_settings(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        tracing::info!("Loading configuration from: {}", path.display());
    }
    let (config, hash) = resolve_config(path).context("Failed to load configuration")?;
    if let Some(hash) = hash {
        tracing::info!("Configuration loaded successfully (hash: {})", hash);
    }
    Ok(config)
}

async fn run(cli: Cli, verbose: u8) -> Result<ExitCode> {
    let mut config = load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Research {
            topic,
            output,
            search,
        } => {
            search.apply(&mut config);
            if let Some(output) = output {
                config.output.report_path = output.display().to_string();
            }
            validate(&config)?;
            let Some(topic) = resolve_input(topic, "Enter research topic: ")? else {
                return Ok(ExitCode::SUCCESS);
            };
            handle_research(&config, &topic).await
        }
        Command::Search {
            topic,
            search,
            timelimit,
        } => {
            search.apply(&mut config);
            if timelimit.is_some() {
                config.searcher.timelimit = timelimit;
            }
            validate(&config)?;
            let Some(topic) = resolve_input(topic, "Enter research topic: ")? else {
                return Ok(ExitCode::SUCCESS);
            };
            handle_search(&config, &topic, verbose > 0).await
        }
        Command::Fetch {
            url,
            output,
            fit,
            timeout,
            no_save,
        } => {
            if let Some(ms) = timeout {
                config.fetcher.request_timeout_ms = ms;
            }
            validate(&config)?;
            let Some(url) = resolve_input(url, "Enter URL to fetch: ")? else {
                return Ok(ExitCode::SUCCESS);
            };
            let destination = if no_save { None } else { Some(output.as_path()) };
            handle_fetch(&config, &url, fit, destination).await
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            validate(&config)?;
            server::serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Uses the argument, else prompts on stdin
///
/// `Ok(None)` means the prompt was aborted (end of input).
fn resolve_input(arg: Option<String>, prompt: &str) -> Result<Option<String>> {
    let raw = match arg {
        Some(value) => value,
        None => {
            print!("\n{}", prompt);
            io::stdout().flush()?;
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                println!("\nAborted.");
                return Ok(None);
            }
            line
        }
    };

    let value = raw.trim();
    if value.is_empty() {
        bail!("No input provided");
    }
    Ok(Some(value.to_string()))
}

async fn handle_research(config: &Config, topic: &str) -> Result<ExitCode> {
    summary::print_research_banner(
        topic,
        &config.searcher.model,
        config.searcher.num_queries,
        config.searcher.results_per_query,
    );

    let collaborators = Collaborators::from_config(config)?;
    let outcome = run_research(topic, config, &collaborators, &LogSink).await?;

    let report = format_aggregate_report(&outcome.topic, &outcome.report);
    let saved = save_report(&report, Path::new(&config.output.report_path))
        .with_context(|| format!("Failed to write report to {}", config.output.report_path))?;

    summary::print_research_summary(&outcome.report, report.chars().count(), &saved);
    Ok(ExitCode::SUCCESS)
}

async fn handle_search(config: &Config, topic: &str, detailed: bool) -> Result<ExitCode> {
    let collaborators = Collaborators::from_config(config)?;
    let searcher = Searcher::new(
        collaborators.generator,
        collaborators.provider,
        config.searcher.clone(),
    );

    let report = searcher.search(topic, &LogSink).await?;
    summary::print_search_report(&report, detailed);
    Ok(ExitCode::SUCCESS)
}

async fn handle_fetch(
    config: &Config,
    raw_url: &str,
    fit: bool,
    destination: Option<&Path>,
) -> Result<ExitCode> {
    let request = validate_url(raw_url)?;

    let renderer: Arc<dyn PageRenderer> = Arc::new(HttpRenderer::new(&config.fetcher));
    renderer.start().await?;
    tracing::info!("Fetching {}", request);
    let fetcher = Fetcher::new(Arc::clone(&renderer), &config.fetcher);
    let result = fetcher.fetch(&request).await;
    if let Err(e) = renderer.stop().await {
        tracing::warn!("Renderer did not stop cleanly: {}", e);
    }

    if let Some(error) = result.error() {
        eprintln!("\nFetch failed: {}", error);
        return Ok(ExitCode::FAILURE);
    }

    let content = if fit {
        result.fit_content().filter(|c| !c.is_empty()).or(result.content())
    } else {
        result.content()
    }
    .unwrap_or_default();

    if content.is_empty() {
        eprintln!("Warning: page returned empty markdown.");
        return Ok(ExitCode::FAILURE);
    }

    let saved = match destination {
        Some(path) => {
            let saved = save_report(content, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Saved {} chars to {}", content.chars().count(), saved.display());
            Some(saved)
        }
        None => {
            println!("{}", content);
            None
        }
    };

    println!("\n{}", "-".repeat(60));
    println!("{}", summary::format_fetch_summary(&result, saved.as_deref()));
    println!("{}", "-".repeat(60));

    Ok(ExitCode::SUCCESS)
}
