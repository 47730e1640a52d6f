//! Fetch coordinator behavior against a scripted renderer

use crate::common::{fetcher_config, urls, MockRenderer, Step};
use deep_research::crawler::FetchCoordinator;
use deep_research::events::{NullSink, RecordingSink};
use deep_research::output::Aggregator;
use deep_research::ProgressEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_one_result_per_input_including_duplicates() {
    let renderer = Arc::new(
        MockRenderer::new(Step::content("body"))
            .script("https://bad.test", vec![Step::Status(500)]),
    );
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(3, 2));
    let input = urls(&[
        "https://a.test",
        "https://b.test",
        "https://a.test",
        "https://bad.test",
        "not a url at all",
    ]);

    let results = coordinator.fetch_many(&input, &NullSink).await;

    assert_eq!(results.len(), input.len());
    assert_eq!(results.iter().filter(|r| r.url == "https://a.test").count(), 2);
    for result in &results {
        if result.is_success() {
            assert!(!result.content().unwrap_or_default().is_empty());
            assert!(result.error().is_none());
        } else {
            assert!(!result.error().unwrap_or_default().is_empty());
            assert!(result.content().is_none());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_never_reaches_renderer() {
    let renderer = Arc::new(MockRenderer::new(Step::content("body")));
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(2, 2));

    let results = coordinator
        .fetch_many(&urls(&["ftp://files.test/x", "https://ok.test"]), &NullSink)
        .await;

    assert_eq!(renderer.total_calls(), 1);
    let rejected = results.iter().find(|r| r.url == "ftp://files.test/x").unwrap();
    assert!(rejected.error().unwrap().starts_with("Invalid URL"));
    assert_eq!(rejected.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_gate_bounds_concurrent_renders() {
    let renderer = Arc::new(MockRenderer::new(Step::slow("body", Duration::from_millis(200))));
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(3, 1));
    let input: Vec<String> = (0..12).map(|i| format!("https://site{i}.test")).collect();

    let results = coordinator.fetch_many(&input, &NullSink).await;

    assert_eq!(results.len(), 12);
    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(renderer.peak(), 3);
    assert_eq!(coordinator.fetcher().gate().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_gate_released_when_attempts_time_out() {
    let renderer = Arc::new(MockRenderer::new(Step::Hang));
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(2, 2));
    let input = urls(&["https://a.test", "https://b.test", "https://c.test"]);

    let results = coordinator.fetch_many(&input, &NullSink).await;

    assert!(results.iter().all(|r| r.error() == Some("Timeout (1000 ms)")));
    assert!(renderer.peak() <= 2);
    assert_eq!(coordinator.fetcher().gate().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_each_run_gets_its_own_gate() {
    let renderer = Arc::new(MockRenderer::new(Step::slow("body", Duration::from_millis(50))));
    let config = fetcher_config(1, 1);
    let first = FetchCoordinator::new(renderer.clone(), &config);
    let second = FetchCoordinator::new(renderer.clone(), &config);
    let first_urls = urls(&["https://a.test", "https://b.test"]);
    let second_urls = urls(&["https://c.test", "https://d.test"]);

    let (a, b) = tokio::join!(
        first.fetch_many(&first_urls, &NullSink),
        second.fetch_many(&second_urls, &NullSink),
    );

    assert_eq!(a.len() + b.len(), 4);
    // one slot per run, and the two runs do not wait on each other
    assert_eq!(renderer.peak(), 2);
    assert_eq!(first.fetcher().gate().in_flight(), 0);
    assert_eq!(second.fetcher().gate().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_results_keyed_by_input_spelling() {
    let renderer = Arc::new(
        MockRenderer::new(Step::Status(500)).script("https://a.test", vec![Step::content("A")]),
    );
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(2, 1));
    let input = urls(&[" a.test ", "b.test"]);

    let results = coordinator.fetch_many(&input, &NullSink).await;
    let mut aggregator = Aggregator::new(input.clone(), 100_000);
    aggregator.record_all(results);
    let report = aggregator.finish(0);

    assert_eq!(renderer.calls_for("https://a.test").len(), 1);
    assert_eq!(report.content(" a.test "), Some("A"));
    assert!(report.error("b.test").is_some());
    for url in report.urls() {
        assert!(report.content(url).is_some() || report.error(url).is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn test_results_and_events_in_completion_order() {
    let renderer = Arc::new(
        MockRenderer::new(Step::content("x"))
            .script("https://slow.test", vec![Step::slow("slow", Duration::from_millis(300))])
            .script("https://medium.test", vec![Step::slow("medium", Duration::from_millis(200))])
            .script("https://fast.test", vec![Step::slow("fast", Duration::from_millis(100))]),
    );
    let coordinator = FetchCoordinator::new(renderer, &fetcher_config(6, 1));
    let sink = RecordingSink::new();

    let results = coordinator
        .fetch_many(
            &urls(&["https://slow.test", "https://medium.test", "https://fast.test"]),
            &sink,
        )
        .await;

    let order: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(order, vec!["https://fast.test", "https://medium.test", "https://slow.test"]);

    let progress: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::ScrapeProgress {
                url,
                completed,
                total,
                ..
            } => Some((url, completed, total)),
            _ => None,
        })
        .collect();
    assert_eq!(
        progress,
        vec![
            ("https://fast.test".to_string(), 1, 3),
            ("https://medium.test".to_string(), 2, 3),
            ("https://slow.test".to_string(), 3, 3),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_scenario_two_successes() {
    let renderer = Arc::new(
        MockRenderer::new(Step::Fail("unexpected".to_string()))
            .script("https://a.test", vec![Step::content("A")])
            .script("https://b.test", vec![Step::content("B")]),
    );
    let coordinator = FetchCoordinator::new(renderer, &fetcher_config(6, 2));
    let input = urls(&["https://a.test", "https://b.test"]);

    let results = coordinator.fetch_many(&input, &NullSink).await;
    let mut aggregator = Aggregator::new(input, 100_000);
    aggregator.record_all(results);
    let report = aggregator.finish(0);

    assert_eq!(report.content("https://a.test"), Some("A"));
    assert_eq!(report.content("https://b.test"), Some("B"));
    assert_eq!(report.pages_scraped(), 2);
    assert!(report.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scenario_not_found_is_not_retried() {
    let renderer = Arc::new(MockRenderer::new(Step::Status(404)));
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(6, 3));

    let results = coordinator.fetch_many(&urls(&["https://c.test"]), &NullSink).await;

    let result = &results[0];
    assert!(!result.is_success());
    assert_eq!(result.status_code, Some(404));
    assert_eq!(result.retries(), 0);
    assert_eq!(renderer.total_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_two_timeouts_then_success() {
    let renderer = Arc::new(
        MockRenderer::new(Step::Hang)
            .script("https://a.test", vec![Step::Hang, Step::Hang, Step::content("finally")]),
    );
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(6, 3));

    let results = coordinator.fetch_many(&urls(&["https://a.test"]), &NullSink).await;

    let result = &results[0];
    assert!(result.is_success());
    assert_eq!(result.content(), Some("finally"));
    assert_eq!(result.attempts, 3);

    // each attempt starts deadline + backoff after the previous one
    let calls = renderer.calls_for("https://a.test");
    assert_eq!(calls.len(), 3);
    let first_gap = calls[1] - calls[0];
    let second_gap = calls[2] - calls[1];
    assert_eq!(first_gap, Duration::from_millis(1_000 + 500));
    assert_eq!(second_gap, Duration::from_millis(1_000 + 1_000));
}

#[tokio::test(start_paused = true)]
async fn test_retries_never_exceed_limit() {
    let renderer = Arc::new(MockRenderer::new(Step::Error("connection reset".to_string())));
    let coordinator = FetchCoordinator::new(renderer.clone(), &fetcher_config(6, 4));
    let start = Instant::now();

    let results = coordinator.fetch_many(&urls(&["https://a.test"]), &NullSink).await;

    assert_eq!(renderer.total_calls(), 4);
    assert_eq!(results[0].attempts, 4);
    assert_eq!(results[0].error(), Some("TransportError: connection reset"));
    assert_eq!(results[0].status_code, None);
    // 0.5 + 1.0 + 2.0 seconds of backoff, none after the last attempt
    assert_eq!(start.elapsed(), Duration::from_millis(3_500));
}

#[tokio::test(start_paused = true)]
async fn test_scenario_everything_fails() {
    let renderer = Arc::new(
        MockRenderer::new(Step::Fail("net::ERR_NAME_NOT_RESOLVED".to_string()))
            .script("https://d.test", vec![Step::Status(503)]),
    );
    let coordinator = FetchCoordinator::new(renderer, &fetcher_config(6, 2));
    let input = urls(&["https://a.test", "https://b.test", "https://d.test"]);

    let results = coordinator.fetch_many(&input, &NullSink).await;
    let mut aggregator = Aggregator::new(input.clone(), 100_000);
    aggregator.record_all(results);
    let report = aggregator.finish(0);

    assert!(report.successes().is_empty());
    assert_eq!(report.errors().len(), 3);
    for url in &input {
        assert!(report.error(url).is_some());
    }
    assert_eq!(report.error("https://d.test"), Some("HTTP 503 for https://d.test"));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_url_last_result_wins() {
    let renderer = Arc::new(
        MockRenderer::new(Step::content("unused")).script(
            "https://a.test",
            vec![
                Step::slow("first", Duration::from_millis(10)),
                Step::slow("second", Duration::from_millis(500)),
            ],
        ),
    );
    let coordinator = FetchCoordinator::new(renderer, &fetcher_config(6, 1));
    let input = urls(&["https://a.test", "https://a.test"]);

    let results = coordinator.fetch_many(&input, &NullSink).await;
    let mut aggregator = Aggregator::new(input, 100_000);
    aggregator.record_all(results);
    let report = aggregator.finish(0);

    assert_eq!(report.pages_scraped(), 1);
    assert_eq!(report.content("https://a.test"), Some("second"));
}
