//! Page renderer backed by a plain HTTP client
//!
//! `start` builds the client, `stop` drops it (and the in-memory cache when
//! caching is enabled). Rendering fetches the page with `reqwest` and
//! converts the HTML to markdown with `scraper`.

use crate::config::{CacheMode, FetcherConfig};
use crate::crawler::markdown::{html_to_markdown, ExtractOptions};
use crate::crawler::renderer::{PageRenderer, RenderConfig, RenderError, RenderOutput};
use crate::url::FetchRequest;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
/// * `page_timeout` - Overall timeout for one page load
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, page_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(page_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP + HTML-to-markdown renderer
pub struct HttpRenderer {
    user_agent: String,
    page_timeout: Duration,
    client: RwLock<Option<Client>>,
    cache: RwLock<HashMap<String, RenderOutput>>,
}

impl HttpRenderer {
    pub fn new(config: &FetcherConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            page_timeout: config.page_timeout(),
            client: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_started(&self) -> bool {
        self.client.read().map(|c| c.is_some()).unwrap_or(false)
    }

    fn client(&self) -> Result<Client, RenderError> {
        self.client
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(RenderError::NotStarted)
    }

    fn cached(&self, url: &str) -> Option<RenderOutput> {
        self.cache.read().ok()?.get(url).cloned()
    }

    fn remember(&self, url: &str, output: &RenderOutput) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(url.to_string(), output.clone());
        }
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn start(&self) -> Result<(), RenderError> {
        let client = build_http_client(&self.user_agent, self.page_timeout)
            .map_err(|e| RenderError::Backend(format!("Failed to build HTTP client: {}", e)))?;
        let mut guard = self
            .client
            .write()
            .map_err(|_| RenderError::Backend("renderer state poisoned".to_string()))?;
        *guard = Some(client);
        tracing::debug!("HTTP renderer started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), RenderError> {
        if let Ok(mut guard) = self.client.write() {
            *guard = None;
        }
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
        tracing::debug!("HTTP renderer stopped");
        Ok(())
    }

    async fn render(
        &self,
        request: &FetchRequest,
        config: &RenderConfig,
    ) -> Result<RenderOutput, RenderError> {
        let client = self.client()?;
        let url = request.url().as_str();

        if config.cache_mode == CacheMode::Enabled {
            if let Some(output) = self.cached(url) {
                tracing::debug!("Cache hit for {}", url);
                return Ok(output);
            }
        }

        let response = client
            .get(request.url().clone())
            .timeout(config.page_timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Ok(RenderOutput::failed(
                Some(status),
                format!("HTTP {} for {}", status, request),
            ));
        }

        let body = response.text().await?;
        let options = ExtractOptions {
            excluded_tags: config.excluded_tags.clone(),
            pruning_threshold: config.pruning_threshold,
            min_word_threshold: config.min_word_threshold,
        };
        let document = html_to_markdown(&body, &options);

        let output = if document.raw.trim().is_empty() {
            RenderOutput::failed(Some(status), "Page produced no extractable content")
        } else {
            let fit = Some(document.fit).filter(|f| !f.trim().is_empty());
            RenderOutput::rendered(Some(status), document.raw, fit)
        };

        if config.cache_mode == CacheMode::Enabled && output.success {
            self.remember(url, &output);
        }

        Ok(output)
    }
}
