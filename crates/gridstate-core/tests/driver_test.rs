//! Tests for the async driver and the in-memory fetcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gridstate_core::{
    Column, FetchError, FetchResult, Fetcher, FilterKind, InMemoryFetcher, LoadState, QueryParams,
    ResponseOutcome, Row, TableConfig, TableController, TableDriver, TableEvent,
};
use serde_json::json;

fn columns() -> Vec<Column> {
    vec![
        Column::new("id", "ID").sortable(),
        Column::new("name", "Name").sortable().searchable(),
        Column::new("status", "Status")
            .sortable()
            .with_filter(FilterKind::Enum),
        Column::new("tags", "Tags").with_filter(FilterKind::Enum),
        Column::new("loss", "Loss")
            .with_path("last_metrics.loss")
            .sortable(),
    ]
}

fn experiments() -> Vec<Row> {
    [
        json!({"id": "t1", "name": "resnet-a", "status": "completed", "tags": ["gpu"], "last_metrics": {"loss": 0.3}}),
        json!({"id": "t2", "name": "resnet-b", "status": "failed", "tags": ["gpu", "nightly"], "last_metrics": {"loss": 0.1}}),
        json!({"id": "t3", "name": "bert", "status": "running", "tags": [], "last_metrics": {"loss": 0.5}}),
        json!({"id": "t4", "name": "bert-large", "status": "completed", "tags": ["nightly"]}),
        json!({"id": "t5", "name": "vit", "status": "failed", "tags": ["gpu"], "last_metrics": {"loss": 0.1}}),
    ]
    .into_iter()
    .map(|data| Row::from_json(data, "id").unwrap())
    .collect()
}

fn ids(table: &TableController) -> Vec<&str> {
    table.rows().iter().map(|r| r.id.as_str()).collect()
}

/// Wraps the in-memory fetcher with a per-query delay and a failure switch.
struct SlowFetcher {
    inner: InMemoryFetcher,
    delay: fn(&QueryParams) -> u64,
    fail: AtomicBool,
}

impl SlowFetcher {
    fn new(delay: fn(&QueryParams) -> u64) -> Self {
        Self {
            inner: InMemoryFetcher::new(experiments(), &columns()),
            delay,
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, params: &QueryParams) -> Result<FetchResult, FetchError> {
        tokio::time::sleep(Duration::from_millis((self.delay)(params))).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Server {
                status: 500,
                message: "boom".to_string(),
            });
        }
        self.inner.fetch(params).await
    }
}

/// Completed-status queries are slow, everything else is fast.
fn slow_for_completed(params: &QueryParams) -> u64 {
    match params.filters.get("status") {
        Some(values) if values.iter().any(|v| v == "completed") => 500,
        _ => 10,
    }
}

fn make_driver(fetcher: SlowFetcher, config: TableConfig) -> TableDriver<SlowFetcher> {
    let table = TableController::new(columns(), config).unwrap();
    TableDriver::new(table, Arc::new(fetcher))
}

#[tokio::test(start_paused = true)]
async fn test_late_response_from_superseded_query_is_discarded() {
    let mut driver = make_driver(SlowFetcher::new(slow_for_completed), TableConfig::default());

    let q1 = driver
        .update(|t| t.set_column_filter("status", ["completed"]))
        .unwrap();
    let q2 = driver
        .update(|t| t.set_column_filter("status", ["failed"]))
        .unwrap();
    assert_eq!(driver.in_flight(), 2);

    // Q2 answers first and is applied.
    assert_eq!(driver.next_response().await.unwrap(), (q2.seq, ResponseOutcome::Applied));
    assert_eq!(ids(driver.controller()), vec!["t2", "t5"]);

    // Q1 arrives afterwards and is dropped.
    assert_eq!(driver.next_response().await.unwrap(), (q1.seq, ResponseOutcome::Stale));
    assert_eq!(ids(driver.controller()), vec!["t2", "t5"]);
    assert_eq!(driver.controller().state(), &LoadState::Loaded);
}

#[tokio::test(start_paused = true)]
async fn test_settle_waits_for_latest_request() {
    let mut driver = make_driver(SlowFetcher::new(|_| 20), TableConfig::default());
    driver.load();
    driver.update(|t| t.apply_sort("name", false)).unwrap();
    driver.settle().await.unwrap();

    assert_eq!(driver.controller().state(), &LoadState::Loaded);
    assert_eq!(ids(driver.controller()), vec!["t5", "t2", "t1", "t4", "t3"]);
    assert_eq!(driver.controller().page().total, Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_abort_superseded_requests() {
    let config = TableConfig::default().with_abort_superseded(true);
    let mut driver = make_driver(SlowFetcher::new(slow_for_completed), config);

    driver
        .update(|t| t.set_column_filter("status", ["completed"]))
        .unwrap();
    driver
        .update(|t| t.set_column_filter("status", ["failed"]))
        .unwrap();
    assert_eq!(driver.in_flight(), 1);

    driver.settle().await.unwrap();
    assert_eq!(ids(driver.controller()), vec!["t2", "t5"]);
    assert_eq!(driver.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_aborted_request_reports_cancelled_as_stale() {
    let config = TableConfig::default().with_abort_superseded(true);
    let mut driver = make_driver(SlowFetcher::new(slow_for_completed), config);
    let mut events = driver.update(|t| t.subscribe());

    let q1 = driver
        .update(|t| t.set_column_filter("status", ["completed"]))
        .unwrap();
    driver
        .update(|t| t.set_column_filter("status", ["failed"]))
        .unwrap();

    assert_eq!(driver.next_response().await.unwrap(), (q1.seq, ResponseOutcome::Stale));
    assert_eq!(driver.controller().state(), &LoadState::Loading);

    driver.settle().await.unwrap();
    assert_eq!(driver.controller().state(), &LoadState::Loaded);
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, TableEvent::Failed { .. }));
    }
}

struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(&self, _params: &QueryParams) -> Result<FetchResult, FetchError> {
        panic!("backend exploded");
    }
}

#[tokio::test]
async fn test_panicking_fetcher_surfaces_as_failure() {
    let table = TableController::new(columns(), TableConfig::default()).unwrap();
    let mut driver = TableDriver::new(table, Arc::new(PanickingFetcher));
    driver.load();

    tokio::time::timeout(Duration::from_secs(5), driver.settle())
        .await
        .expect("settle returns after a fetcher panic")
        .unwrap();

    match driver.controller().last_error() {
        Some(FetchError::Transport(message)) => assert!(message.contains("backend exploded")),
        other => panic!("expected a transport failure, got {:?}", other),
    }
    assert!(driver.controller().pending_request().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_reported_as_failure() {
    let config = TableConfig::default().with_timeout_ms(100);
    let mut driver = make_driver(SlowFetcher::new(|_| 1_000), config);
    driver.load();
    driver.settle().await.unwrap();

    assert_eq!(
        driver.controller().state(),
        &LoadState::Error(FetchError::Timeout(100))
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_then_retry() {
    let fetcher = Arc::new(SlowFetcher::new(|_| 5));
    fetcher.fail.store(true, Ordering::SeqCst);
    let table = TableController::new(columns(), TableConfig::default()).unwrap();
    let mut driver = TableDriver::new(table, Arc::clone(&fetcher));

    let first = driver.load();
    driver.settle().await.unwrap();
    assert!(matches!(
        driver.controller().last_error(),
        Some(FetchError::Server { status: 500, .. })
    ));
    assert!(driver.controller().rows().is_empty());

    fetcher.fail.store(false, Ordering::SeqCst);
    let second = driver.retry();
    assert!(second > first);
    assert_eq!(driver.controller().state(), &LoadState::Loading);

    driver.settle().await.unwrap();
    assert_eq!(driver.controller().state(), &LoadState::Loaded);
    assert_eq!(driver.controller().rows().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_settle_returns_when_idle() {
    let mut driver = make_driver(SlowFetcher::new(|_| 5), TableConfig::default());
    driver.settle().await.unwrap();
    assert_eq!(driver.controller().state(), &LoadState::Idle);
}

#[tokio::test]
async fn test_in_memory_and_or_filters_on_tags() {
    let fetcher = InMemoryFetcher::new(experiments(), &columns());
    let mut params = QueryParams {
        limit: 50,
        ..Default::default()
    };
    params
        .filters
        .insert("tags".to_string(), vec!["gpu".to_string(), "nightly".to_string()]);

    let any = fetcher.fetch(&params).await.unwrap();
    assert_eq!(any.total_count, Some(4));

    params.combination = gridstate_core::CombinationMode::And;
    let all = fetcher.fetch(&params).await.unwrap();
    let ids: Vec<&str> = all.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["t2"]);
}

#[test]
fn test_in_memory_sort_ties_break_by_id() {
    let fetcher = InMemoryFetcher::new(experiments(), &columns());
    let mut params = QueryParams {
        limit: 50,
        ..Default::default()
    };
    params.order_by = vec![gridstate_core::SortKey::asc("loss")];

    let result = fetcher.evaluate(&params);
    let ids: Vec<&str> = result.rows.iter().map(|r| r.id.as_str()).collect();
    // t4 has no loss and sorts first; t2 and t5 tie on 0.1.
    assert_eq!(ids, vec!["t4", "t2", "t5", "t1", "t3"]);

    params.order_by = vec![gridstate_core::SortKey::desc("loss")];
    let result = fetcher.evaluate(&params);
    let ids: Vec<&str> = result.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["t3", "t1", "t2", "t5", "t4"]);
}

#[test]
fn test_in_memory_search_and_paging() {
    let fetcher = InMemoryFetcher::new(experiments(), &columns());
    let mut params = QueryParams {
        limit: 1,
        offset: 1,
        global_query: Some("RESNET".to_string()),
        search_fields: vec!["name".to_string()],
        ..Default::default()
    };
    let result = fetcher.evaluate(&params);
    assert_eq!(result.total_count, Some(2));
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].id, "t2");

    params.global_query = None;
    params.offset = 0;
    params.limit = 10;
    params
        .search_terms
        .insert("status".to_string(), "fail".to_string());
    let result = fetcher.evaluate(&params);
    assert_eq!(result.total_count, Some(2));
}
