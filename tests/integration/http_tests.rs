//! HTTP backends against wiremock servers

use crate::common::fetcher_config;
use deep_research::config::{CacheMode, SearcherConfig};
use deep_research::crawler::{FetchCoordinator, HttpRenderer, PageRenderer, RenderConfig};
use deep_research::events::NullSink;
use deep_research::search::{DuckDuckGoSearch, OllamaClient, QueryGenerator, SearchError, SearchProvider, SearchQuery};
use deep_research::validate_url;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<html><head><title>Async Rust</title></head><body>
  <nav><a href="/">Home</a> <a href="/blog">Blog</a></nav>
  <h1>Async Rust</h1>
  <p>Futures in Rust are lazy state machines that do nothing until they are polled by an
     executor, which lets the compiler lay out every suspension point ahead of time and keeps
     the runtime small enough to embed almost anywhere.</p>
  <footer>Copyright</footer>
</body></html>"#;

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

#[tokio::test]
async fn test_http_renderer_extracts_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html(ARTICLE))
        .mount(&server)
        .await;

    let config = fetcher_config(2, 1);
    let renderer = HttpRenderer::new(&config);
    renderer.start().await.unwrap();
    let request = validate_url(&format!("{}/article", server.uri())).unwrap();

    let output = renderer
        .render(&request, &RenderConfig::from(&config))
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.status_code, Some(200));
    let raw = output.raw_markdown.unwrap();
    assert!(raw.starts_with("# Async Rust"));
    assert!(raw.contains("lazy state machines"));
    assert!(!raw.contains("Home"));
    assert!(!raw.contains("Copyright"));
    assert!(output.fit_markdown.unwrap().contains("lazy state machines"));
}

#[tokio::test]
async fn test_http_renderer_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = fetcher_config(2, 1);
    let renderer = HttpRenderer::new(&config);
    renderer.start().await.unwrap();
    let request = validate_url(&format!("{}/missing", server.uri())).unwrap();

    let output = renderer
        .render(&request, &RenderConfig::from(&config))
        .await
        .unwrap();

    assert!(!output.success);
    assert_eq!(output.status_code, Some(404));
}

#[tokio::test]
async fn test_http_renderer_cache_lives_until_stop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(html(ARTICLE))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = fetcher_config(2, 1);
    config.cache_mode = CacheMode::Enabled;
    let renderer = HttpRenderer::new(&config);
    let render_config = RenderConfig::from(&config);
    let request = validate_url(&format!("{}/cached", server.uri())).unwrap();

    renderer.start().await.unwrap();
    renderer.render(&request, &render_config).await.unwrap();
    renderer.render(&request, &render_config).await.unwrap();
    renderer.stop().await.unwrap();

    renderer.start().await.unwrap();
    renderer.render(&request, &render_config).await.unwrap();
    renderer.stop().await.unwrap();
    // dropping the server verifies exactly two requests arrived
}

#[tokio::test]
async fn test_coordinator_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html(ARTICLE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    let config = fetcher_config(2, 3);
    let renderer: Arc<dyn PageRenderer> = Arc::new(HttpRenderer::new(&config));
    renderer.start().await.unwrap();
    let coordinator = FetchCoordinator::new(renderer.clone(), &config);
    let ok = format!("{}/ok", server.uri());
    let gone = format!("{}/gone", server.uri());

    let results = coordinator.fetch_many(&[ok.clone(), gone.clone()], &NullSink).await;
    renderer.stop().await.unwrap();

    let ok_result = results.iter().find(|r| r.url == ok).unwrap();
    assert!(ok_result.is_success());
    let gone_result = results.iter().find(|r| r.url == gone).unwrap();
    assert_eq!(gone_result.status_code, Some(410));
    assert_eq!(gone_result.attempts, 1);
}

fn searcher_config(host: String) -> SearcherConfig {
    SearcherConfig {
        ollama_host: host,
        model: "test-model".to_string(),
        ollama_timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ollama_generates_queries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "test-model", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-model",
            "message": {
                "role": "assistant",
                "content": "```json\n[\"rust futures explained\", \"tokio vs async-std\", \"pin and unpin\", \"extra\"]\n```"
            },
            "done": true
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&searcher_config(server.uri())).unwrap();
    let queries = client.generate("async rust", 3).await.unwrap();

    assert_eq!(
        queries,
        vec!["rust futures explained", "tokio vs async-std", "pin and unpin"]
    );
}

#[tokio::test]
async fn test_ollama_unparsable_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "[]"}
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&searcher_config(server.uri())).unwrap();
    let err = client.generate("anything", 3).await.unwrap_err();

    assert!(matches!(err, SearchError::Parse(_)));
    assert!(err.to_string().starts_with("LLM returned no parsable queries"));
}

#[tokio::test]
async fn test_ollama_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&searcher_config(server.uri())).unwrap();
    let err = client.generate("anything", 3).await.unwrap_err();

    assert!(matches!(err, SearchError::Connection(_)));
    assert!(err.to_string().contains("model not found"));
}

#[tokio::test]
async fn test_ollama_unreachable() {
    // nothing listens on port 9 on the loopback interface
    let client = OllamaClient::new(&searcher_config("http://127.0.0.1:9".to_string())).unwrap();
    let err = client.generate("anything", 3).await.unwrap_err();

    assert!(matches!(err, SearchError::Connection(_)));
    assert!(err.to_string().contains("Cannot reach Ollama at http://127.0.0.1:9"));
}

#[tokio::test]
async fn test_ollama_lists_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3.1:8b"}, {"name": "qwen2.5:7b"}]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&searcher_config(server.uri())).unwrap();

    assert_eq!(client.list_models().await.unwrap(), vec!["llama3.1:8b", "qwen2.5:7b"]);
}

#[tokio::test]
async fn test_duckduckgo_form_and_parsing() {
    let server = MockServer::start().await;
    let page = r#"<html><body>
        <div class="result">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Ftokio.rs%2Ftokio%2Ftutorial&amp;rut=1">Tokio tutorial</a>
          <a class="result__snippet">Learn tokio.</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://rust-lang.org/">Rust</a>
        </div>
    </body></html>"#;
    Mock::given(method("POST"))
        .and(path("/html/"))
        .and(body_string_contains("q=tokio+tutorial"))
        .and(body_string_contains("kp=-2"))
        .and(body_string_contains("df=w"))
        .respond_with(html(page))
        .mount(&server)
        .await;

    let provider = DuckDuckGoSearch::with_endpoint(
        format!("{}/html/", server.uri()),
        "DeepResearch/test",
        Duration::from_secs(5),
    );
    let query = SearchQuery {
        text: "tokio tutorial".to_string(),
        region: "wt-wt".to_string(),
        safesearch: "off".to_string(),
        timelimit: Some("w".to_string()),
        max_results: 5,
    };

    let hits = tokio::task::spawn_blocking(move || provider.search(&query))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://tokio.rs/tokio/tutorial");
    assert_eq!(hits[0].title, "Tokio tutorial");
    assert_eq!(hits[0].snippet, "Learn tokio.");
    assert_eq!(hits[1].url, "https://rust-lang.org/");
}

#[tokio::test]
async fn test_duckduckgo_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let provider = DuckDuckGoSearch::with_endpoint(
        format!("{}/html/", server.uri()),
        "DeepResearch/test",
        Duration::from_secs(5),
    );
    let query = SearchQuery {
        text: "x".to_string(),
        region: "wt-wt".to_string(),
        safesearch: "moderate".to_string(),
        timelimit: None,
        max_results: 5,
    };

    let err = tokio::task::spawn_blocking(move || provider.search(&query))
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, SearchError::Provider(_)));
}
