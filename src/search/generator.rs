//! Query generation through a language model

use crate::config::SearcherConfig;
use crate::search::parse::parse_queries;
use crate::search::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str =
    "You are a precise JSON generator. Output ONLY valid JSON with no extra text.";

/// Produces search queries for a research topic
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, topic: &str, count: usize) -> Result<Vec<String>, SearchError>;
}

/// User prompt asking for `count` diverse queries as a JSON array
pub fn build_prompt(topic: &str, count: usize) -> String {
    format!(
        "You are a research assistant. Generate exactly {count} diverse web search \
         queries for the research topic below.\n\n\
         RULES:\n\
         - Each query must approach the topic from a DIFFERENT angle (overview, recent \
         developments, technical details, comparisons, expert opinions, case studies).\n\
         - Queries should be concise (3-8 words each).\n\
         - Respond ONLY with a JSON array of strings. No explanation, no markdown fences, \
         no preamble.\n\n\
         TOPIC: {topic}\n\n\
         RESPOND WITH ONLY A JSON ARRAY:"
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    name: String,
}

/// Client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
    model: String,
    temperature: f64,
}

impl OllamaClient {
    pub fn new(config: &SearcherConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(config.ollama_timeout())
            .build()
            .map_err(|e| SearchError::Connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            host: config.ollama_host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn unreachable(&self, err: reqwest::Error) -> SearchError {
        SearchError::Connection(format!(
            "Cannot reach Ollama at {}. Is `ollama serve` running? ({err})",
            self.host
        ))
    }

    /// Sends one non-streaming chat turn and returns the reply text
    pub async fn chat(&self, user_prompt: &str) -> Result<String, SearchError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Connection(format!(
                "Ollama returned an error: {status} {body}"
            )));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Connection(format!("Ollama returned an error: {e}")))?;
        Ok(reply.message.content)
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, SearchError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.host))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !response.status().is_success() {
            return Err(SearchError::Connection(format!(
                "Ollama returned an error: {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Connection(format!("Ollama returned an error: {e}")))?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| m.name)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

#[async_trait]
impl QueryGenerator for OllamaClient {
    async fn generate(&self, topic: &str, count: usize) -> Result<Vec<String>, SearchError> {
        tracing::info!("Generating {} queries with {}", count, self.model);
        let raw = self.chat(&build_prompt(topic, count)).await?;
        tracing::debug!("Model output: {}", raw);

        let mut queries = parse_queries(&raw);
        if queries.is_empty() {
            return Err(SearchError::Parse(format!(
                "LLM returned no parsable queries. Raw output:\n{raw}"
            )));
        }
        queries.truncate(count);
        Ok(queries)
    }
}
