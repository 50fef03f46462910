//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tidemark::config::{
    compute_config_hash, Config, CrawlConfig, ExtractConfig, OutputConfig, UserAgentConfig,
};
use tidemark::crawler::{
    crawl_file, AbortReason, CrawlOutcome, FetchedPage, HtmlParser, ParseError, ParsedPage,
    Parser, RequestOutcome, RetryExecutor, StopReason,
};
use tidemark::output::{CrawlObserver, StatsCollector, StatsEvent};
use tidemark::state::{CrawlPhase, CrawlState, Record};
use tidemark::storage::{CheckpointStore, JsonCheckpointStore};
use tidemark::CrawlOrchestrator;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration crawling `{base_url}/page-1.html`
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    let mut crawl = CrawlConfig::new(format!("{}/page-1.html", base_url));
    crawl.min_delay = 0.001;
    crawl.max_delay = 0.1;
    crawl.initial_delay = 0.01;
    crawl.base_timeout = 2.0;

    let mut fields = BTreeMap::new();
    fields.insert("title".to_string(), "a.key".to_string());

    Config {
        crawl,
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            checkpoint_path: dir.join("checkpoint.json").display().to_string(),
            json_path: None,
            summary_path: None,
            database_path: None,
        },
        extract: ExtractConfig {
            item_selector: "article.item".to_string(),
            key_selector: "a.key".to_string(),
            key_attribute: "href".to_string(),
            next_page_selector: Some("li.next a".to_string()),
            fields,
        },
    }
}

/// Renders a listing page with items `ids` and an optional next-page link
fn listing(ids: impl IntoIterator<Item = u32>, next: Option<&str>) -> String {
    let items: String = ids
        .into_iter()
        .map(|id| {
            format!(
                r#"<article class="item"><a class="key" href="/items/{id}">Item {id}</a></article>"#
            )
        })
        .collect();
    let pager = next
        .map(|href| format!(r#"<ul><li class="next"><a href="{}">next</a></li></ul>"#, href))
        .unwrap_or_default();
    format!("<html><body>{}{}</body></html>", items, pager)
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

/// Observer capturing the events the tests assert on
#[derive(Default)]
struct Recorder {
    fetches: Mutex<Vec<String>>,
    checkpoints: Mutex<Vec<usize>>,
    phases: Mutex<Vec<CrawlPhase>>,
    duplicates: Mutex<Vec<String>>,
}

impl CrawlObserver for Recorder {
    fn on_phase(&self, _from: CrawlPhase, to: CrawlPhase) {
        self.phases.lock().unwrap().push(to);
    }

    fn on_fetch_outcome(&self, _url: &str, outcome: &RequestOutcome) {
        let label = match outcome {
            RequestOutcome::Success(page) => format!("success {}", page.status),
            RequestOutcome::Blocked(_) => "blocked".to_string(),
            RequestOutcome::TransientFailure(_) => "transient".to_string(),
            RequestOutcome::ExhaustedRetries { attempts, .. } => format!("exhausted {}", attempts),
            RequestOutcome::Cancelled => "cancelled".to_string(),
        };
        self.fetches.lock().unwrap().push(label);
    }

    fn on_duplicate(&self, key: &str) {
        self.duplicates.lock().unwrap().push(key.to_string());
    }

    fn on_checkpoint_saved(&self, items: usize) {
        self.checkpoints.lock().unwrap().push(items);
    }
}

/// Requests shutdown while answering, the way a Ctrl-C mid-request would
struct ShutdownDuring {
    flag: Arc<AtomicBool>,
    response: ResponseTemplate,
}

impl Respond for ShutdownDuring {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.flag.store(true, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Parser that rejects one page and delegates the rest
struct FailOnPage {
    inner: HtmlParser,
    failing_path: &'static str,
}

impl Parser for FailOnPage {
    fn extract(&self, page: &FetchedPage) -> Result<ParsedPage, ParseError> {
        if page.url.ends_with(self.failing_path) {
            return Err(ParseError::Other("unexpected layout".to_string()));
        }
        self.inner.extract(page)
    }
}

fn load_checkpoint(config: &Config) -> CrawlState {
    JsonCheckpointStore::new(&config.output.checkpoint_path).load()
}

#[tokio::test]
async fn test_block_then_success_adapts_delay() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    // First attempt is rate limited, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=20, None)))
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed(StopReason::NoNextPage));
    assert_eq!(report.stats.blocked_detections, 1);
    assert_eq!(report.stats.retries, 1);
    assert_eq!(report.stats.total_requests, 2);
    assert_eq!(report.stats.items_scraped, 20);
    assert_eq!(report.items_total, 20);

    // 0.01 * 1.5 after the block, then * 0.9 after the success
    assert!((report.stats.current_delay - 0.0135).abs() < 1e-9);

    assert_eq!(*recorder.fetches.lock().unwrap(), vec!["success 200"]);
}

#[tokio::test]
async fn test_resume_skips_checkpointed_items() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path());

    // Checkpoint already holds items 1..=5
    let mut stats = StatsCollector::new(0.01);
    stats.record(StatsEvent::RequestStarted);
    stats.record(StatsEvent::RequestSucceeded);
    for _ in 0..5 {
        stats.record(StatsEvent::ItemScraped);
    }
    let items: Vec<Record> = (1..=5)
        .map(|id| Record::new(format!("{}/items/{}", base_url, id)))
        .collect();
    let state = CrawlState::from_parts(items, stats.snapshot(), 0.01, None);
    JsonCheckpointStore::new(&config.output.checkpoint_path)
        .save(&state)
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=8, None)))
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.items_total, 8);
    assert_eq!(report.stats.items_scraped, 8);
    assert_eq!(recorder.duplicates.lock().unwrap().len(), 5);

    let saved = load_checkpoint(&config);
    let keys: Vec<String> = saved.items().iter().map(|r| r.key.clone()).collect();
    let expected: Vec<String> = (1..=8)
        .map(|id| format!("{}/items/{}", base_url, id))
        .collect();
    assert_eq!(keys, expected);
    assert_eq!(saved.stats.start_time, state.stats.start_time);
}

#[tokio::test]
async fn test_timeouts_exhaust_retries() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawl.max_retries = 2;
    config.crawl.base_timeout = 0.05;

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=3, None)).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        CrawlOutcome::Aborted(AbortReason::FetchFailed(_))
    ));
    assert_eq!(report.outcome.exit_code(), 3);
    assert_eq!(report.stats.total_requests, 3);
    assert_eq!(report.stats.retries, 2);
    assert_eq!(report.stats.failed_requests, 1);
    assert_eq!(report.stats.successful_requests, 0);
    assert_eq!(report.items_total, 0);
    assert_eq!(*recorder.fetches.lock().unwrap(), vec!["exhausted 3"]);

    // Exhaustion slows the crawl down once
    assert!((report.stats.current_delay - 0.015).abs() < 1e-9);
}

#[tokio::test]
async fn test_pagination_and_dedup_across_pages() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=5, Some("page-2.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-2.html"))
        .respond_with(html(listing(4..=8, Some("/page-3.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-3.html"))
        .respond_with(html(listing(std::iter::empty::<u32>(), None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed(StopReason::NoItems));
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.items_total, 8);
    assert_eq!(report.stats.items_scraped, 8);
    assert_eq!(recorder.duplicates.lock().unwrap().len(), 2);

    let saved = load_checkpoint(&config);
    assert_eq!(saved.len(), 8);
    assert_eq!(
        saved.items()[0].fields.get("title").map(String::as_str),
        Some("Item 1")
    );

    let phases = recorder.phases.lock().unwrap();
    assert_eq!(phases.first(), Some(&CrawlPhase::Paging));
    assert_eq!(phases.last(), Some(&CrawlPhase::Done));
}

#[tokio::test]
async fn test_checkpoint_every_n_items() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawl.checkpoint_every_n_items = 3;

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=7, None)))
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.items_total, 7);
    // Periodic saves at 3 and 6, then the final save
    assert_eq!(*recorder.checkpoints.lock().unwrap(), vec![3, 6, 7]);

    let phases = recorder.phases.lock().unwrap();
    assert_eq!(
        phases
            .iter()
            .filter(|p| **p == CrawlPhase::Checkpointed)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_abort_then_resume_from_frontier() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=3, Some("page-2.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-2.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-2.html"))
        .respond_with(html(listing(4..=6, None)))
        .mount(&mock_server)
        .await;

    let first = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(
        first.outcome,
        CrawlOutcome::Aborted(AbortReason::HttpStatus(503))
    );
    assert_eq!(first.items_total, 3);

    let saved = load_checkpoint(&config);
    assert_eq!(
        saved.frontier,
        Some(format!("{}/page-2.html", mock_server.uri()))
    );

    let second = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(
        second.outcome,
        CrawlOutcome::Completed(StopReason::NoNextPage)
    );
    assert_eq!(second.pages_fetched, 1);
    assert_eq!(second.items_total, 6);
    assert_eq!(second.stats.items_scraped, 6);
    assert_eq!(second.stats.total_requests, 3);
}

#[tokio::test]
async fn test_fresh_ignores_checkpoint() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path());

    let state = CrawlState::from_parts(
        vec![Record::new(format!("{}/items/1", base_url))],
        StatsCollector::new(0.01).snapshot(),
        0.05,
        Some(format!("{}/page-9.html", base_url)),
    );
    JsonCheckpointStore::new(&config.output.checkpoint_path)
        .save(&state)
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=2, None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = CrawlOrchestrator::new(config.clone(), true)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.items_total, 2);
    assert_eq!(report.stats.items_scraped, 2);
    assert_eq!(report.stats.total_requests, 1);
}

#[tokio::test]
async fn test_shutdown_before_start_saves_checkpoint() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .respond_with(html(listing(1..=3, None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_shutdown(Arc::new(AtomicBool::new(true)))
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Interrupted);
    assert_eq!(report.outcome.exit_code(), 130);
    assert!(Path::new(&config.output.checkpoint_path).exists());

    let saved = load_checkpoint(&config);
    assert_eq!(saved.frontier, Some(config.crawl.base_url.clone()));
    assert_eq!(saved.stats.total_requests, 0);
}

#[tokio::test]
async fn test_not_found_aborts() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        CrawlOutcome::Aborted(AbortReason::HttpStatus(404))
    );
    // A 404 is a response, not a block or a transport failure
    assert_eq!(report.stats.successful_requests, 1);
    assert_eq!(report.stats.retries, 0);
    assert_eq!(report.stats.blocked_detections, 0);
}

#[tokio::test]
async fn test_captcha_exhausts_retries() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawl.max_retries = 1;

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(
            "<html><body>Please solve this CAPTCHA</body></html>".to_string(),
        ))
        .expect(2)
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        CrawlOutcome::Aborted(AbortReason::FetchFailed(_))
    ));
    assert_eq!(report.stats.blocked_detections, 2);
    assert_eq!(report.stats.retries, 1);
    assert_eq!(report.stats.failed_requests, 1);
    assert_eq!(*recorder.fetches.lock().unwrap(), vec!["exhausted 2"]);

    // Each block multiplies the delay by 1.5
    assert!((report.stats.current_delay - 0.0225).abs() < 1e-9);
}

#[tokio::test]
async fn test_sinks_receive_final_items() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    let json_path = dir.path().join("items.json");
    let summary_path = dir.path().join("summary.md");
    let database_path = dir.path().join("items.db");
    config.output.json_path = Some(json_path.display().to_string());
    config.output.summary_path = Some(summary_path.display().to_string());
    config.output.database_path = Some(database_path.display().to_string());

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=4, None)))
        .mount(&mock_server)
        .await;

    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.items_total, 4);

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(exported["items"].as_array().unwrap().len(), 4);
    assert_eq!(exported["stats"]["items_scraped"], 4);

    let summary = std::fs::read_to_string(&summary_path).unwrap();
    assert!(summary.contains("Item 3"));

    assert!(database_path.exists());
}

#[tokio::test]
async fn test_self_linking_page_stops() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=3, Some("page-1.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        CrawlOrchestrator::new(config.clone(), false).unwrap().run(),
    )
    .await
    .expect("crawl did not terminate")
    .unwrap();

    assert_eq!(
        report.outcome,
        CrawlOutcome::Completed(StopReason::PaginationCycle(format!(
            "{}/page-1.html",
            mock_server.uri()
        )))
    );
    assert_eq!(report.outcome.exit_code(), 0);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.items_total, 3);
}

#[tokio::test]
async fn test_pagination_loop_stops() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=3, Some("page-2.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-2.html"))
        .respond_with(html(listing(3..=5, Some("/page-1.html#top"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        CrawlOrchestrator::new(config.clone(), false).unwrap().run(),
    )
    .await
    .expect("crawl did not terminate")
    .unwrap();

    assert!(matches!(
        report.outcome,
        CrawlOutcome::Completed(StopReason::PaginationCycle(_))
    ));
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.items_total, 5);
    assert_eq!(load_checkpoint(&config).len(), 5);
}

#[tokio::test]
async fn test_shutdown_after_block_keeps_frontier() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());
    let shutdown = Arc::new(AtomicBool::new(false));

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=3, Some("page-2.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-2.html"))
        .respond_with(ShutdownDuring {
            flag: Arc::clone(&shutdown),
            response: ResponseTemplate::new(429),
        })
        .expect(1)
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .with_shutdown(Arc::clone(&shutdown))
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Interrupted);
    assert_eq!(report.outcome.exit_code(), 130);
    assert_eq!(
        *recorder.fetches.lock().unwrap(),
        vec!["success 200", "blocked"]
    );
    assert_eq!(report.stats.blocked_detections, 1);
    assert_eq!(report.stats.total_requests, 2);
    assert_eq!(report.stats.retries, 0);

    let saved = load_checkpoint(&config);
    assert_eq!(saved.len(), 3);
    assert_eq!(
        saved.frontier,
        Some(format!("{}/page-2.html", mock_server.uri()))
    );
}

#[tokio::test]
async fn test_shutdown_after_timeout_keeps_frontier() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawl.base_timeout = 0.05;
    let shutdown = Arc::new(AtomicBool::new(false));

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(ShutdownDuring {
            flag: Arc::clone(&shutdown),
            response: html(listing(1..=3, None)).set_delay(Duration::from_millis(500)),
        })
        .expect(1)
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let report = CrawlOrchestrator::new(config.clone(), false)
        .unwrap()
        .with_observer(recorder.clone())
        .with_shutdown(Arc::clone(&shutdown))
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Interrupted);
    assert_eq!(report.outcome.exit_code(), 130);
    assert_eq!(*recorder.fetches.lock().unwrap(), vec!["transient"]);
    assert_eq!(report.stats.total_requests, 1);
    assert_eq!(report.items_total, 0);

    let saved = load_checkpoint(&config);
    assert_eq!(saved.frontier, Some(config.crawl.base_url.clone()));
}

#[tokio::test]
async fn test_parse_failure_keeps_prior_items() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=3, Some("page-2.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-2.html"))
        .respond_with(html(listing(4..=6, None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let parser = FailOnPage {
        inner: HtmlParser::from_config(&config.extract).unwrap(),
        failing_path: "/page-2.html",
    };
    let executor = RetryExecutor::new(&config.crawl, &config.user_agent).unwrap();
    let recorder = Arc::new(Recorder::default());

    let report = CrawlOrchestrator::with_parts(
        &config.crawl,
        executor,
        Box::new(parser),
        Box::new(JsonCheckpointStore::new(&config.output.checkpoint_path)),
        recorder.clone(),
        Vec::new(),
        Arc::new(AtomicBool::new(false)),
        false,
    )
    .run()
    .await
    .unwrap();

    assert!(matches!(
        report.outcome,
        CrawlOutcome::Completed(StopReason::ParseFailure(_))
    ));
    assert_eq!(report.outcome.exit_code(), 0);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.items_total, 3);
    assert_eq!(report.stats.parse_errors, 1);
    assert_eq!(report.stats.items_scraped, 3);
    assert_eq!(
        recorder.phases.lock().unwrap().last(),
        Some(&CrawlPhase::Done)
    );

    let saved = load_checkpoint(&config);
    assert_eq!(saved.len(), 3);
    assert_eq!(saved.stats.parse_errors, 1);
}

#[tokio::test]
async fn test_crawl_file_records_config_hash() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint_path = dir.path().join("checkpoint.json");
    let config_path = dir.path().join("tidemark.toml");

    let toml = format!(
        r#"
[crawl]
base-url = "{}/page-1.html"
min-delay = 0.001
max-delay = 0.1
initial-delay = 0.01

[output]
checkpoint-path = "{}"

[extract]
item-selector = "article.item"
key-selector = "a.key"
"#,
        mock_server.uri(),
        checkpoint_path.display()
    );
    std::fs::write(&config_path, toml).unwrap();

    Mock::given(method("GET"))
        .and(path("/page-1.html"))
        .respond_with(html(listing(1..=2, None)))
        .mount(&mock_server)
        .await;

    let report = crawl_file(&config_path, false).await.unwrap();
    assert_eq!(report.items_total, 2);

    let record = JsonCheckpointStore::new(&checkpoint_path)
        .read_record()
        .unwrap()
        .unwrap();
    assert_eq!(
        record.config_hash,
        Some(compute_config_hash(&config_path).unwrap())
    );
}
