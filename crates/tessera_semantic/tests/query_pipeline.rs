//! End-to-end tests for the query pipeline against scripted backends.

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tessera_graphql::{GraphqlError, GraphqlRequest, GraphqlTransport};
use tessera_semantic::{
    BackendError, GroupByParam, OrderByParam, PollingQueryBackend, QueryBackend, QueryError, QueryParams,
    QueryRequest, QueryResult, QuerySession, SemanticLayerFetcher, SessionClient, SessionQueryBackend,
};

const TIMEOUT_MESSAGE: &str = "Query timed out. Please try again or simplify your query.";

// =============================================================================
// Scripted GraphQL backend
// =============================================================================

#[derive(Default)]
struct FakeSemanticLayer {
    /// Poll answers in order; `fallback_status` once drained
    statuses: Mutex<VecDeque<&'static str>>,
    fallback_status: &'static str,
    failure: Option<String>,
    json_result: Value,
    submit_errors: bool,
    /// Status requests never answer
    hang_polls: bool,
    /// Status requests answer after this long
    poll_delay: Option<Duration>,

    metric_calls: AtomicUsize,
    dimension_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    poll_times: Mutex<Vec<tokio::time::Instant>>,
    submitted: Mutex<Vec<GraphqlRequest>>,
}

impl FakeSemanticLayer {
    fn running_forever() -> Self {
        Self {
            fallback_status: "RUNNING",
            ..Default::default()
        }
    }

    fn scripted(statuses: &[&'static str]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            fallback_status: "RUNNING",
            ..Default::default()
        }
    }

    fn total_calls(&self) -> usize {
        self.metric_calls.load(Ordering::SeqCst)
            + self.dimension_calls.load(Ordering::SeqCst)
            + self.submit_calls.load(Ordering::SeqCst)
            + self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphqlTransport for FakeSemanticLayer {
    async fn send(&self, request: &GraphqlRequest) -> Result<Value, GraphqlError> {
        let query = request.query.as_str();
        if query.contains("GetMetrics") {
            self.metric_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({"data": {"metrics": [
                {"name": "revenue", "type": "SIMPLE", "label": "Revenue", "description": null},
                {"name": "orders", "type": "SIMPLE", "label": null, "description": null},
                {"name": "customers", "type": "DERIVED", "label": null, "description": null}
            ]}}));
        }
        if query.contains("GetDimensions") {
            self.dimension_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({"data": {"dimensions": [
                {"name": "metric_time", "type": "TIME", "label": null, "description": null,
                 "queryableGranularities": ["DAY", "MONTH"], "queryableTimeGranularities": []},
                {"name": "region", "type": "CATEGORICAL", "label": null, "description": null,
                 "queryableGranularities": [], "queryableTimeGranularities": []}
            ]}}));
        }
        if query.contains("CreateQuery") {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            self.submitted.lock().unwrap().push(request.clone());
            if self.submit_errors {
                return Ok(json!({"errors": [{"message": "environment not found"}]}));
            }
            return Ok(json!({"data": {"createQuery": {"queryId": "q-1"}}}));
        }
        if query.contains("GetQueryResult") {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            self.poll_times.lock().unwrap().push(tokio::time::Instant::now());
            if self.hang_polls {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.poll_delay {
                tokio::time::sleep(delay).await;
            }
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback_status);
            let error = if status == "FAILED" { json!(self.failure) } else { Value::Null };
            let result = if status == "SUCCESSFUL" { self.json_result.clone() } else { Value::Null };
            return Ok(json!({"data": {"query": {
                "status": status,
                "error": error,
                "jsonResult": result
            }}}));
        }
        Ok(json!({"errors": [{"message": format!("unexpected operation: {}", query)}]}))
    }
}

fn polling_fetcher(api: &Arc<FakeSemanticLayer>) -> SemanticLayerFetcher {
    let backend = Arc::new(PollingQueryBackend::new(api.clone(), 7));
    SemanticLayerFetcher::new(api.clone(), 7, backend)
}

fn params(metrics: &[&str]) -> QueryParams {
    QueryParams {
        metrics: metrics.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    }
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_metric_short_circuits_dimension_check() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let fetcher = polling_fetcher(&api);

    let mut query = params(&["revehue"]);
    query.group_by = Some(vec![GroupByParam::dimension("regoin")]);

    let result = fetcher.query_metrics(&query).await.unwrap();

    let QueryResult::Error(message) = result else {
        panic!("expected validation error");
    };
    assert!(message.starts_with("Errors: Metric revehue not found. Did you mean: revenue"));
    assert!(!message.contains("Dimension"));
    assert_eq!(api.dimension_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_dimension_reported_with_suggestion() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let fetcher = polling_fetcher(&api);

    let mut query = params(&["revenue"]);
    query.group_by = Some(vec![GroupByParam::dimension("regoin")]);

    let result = fetcher.query_metrics(&query).await.unwrap();
    assert_eq!(
        result,
        QueryResult::Error("Errors: Dimension regoin not found. Did you mean: region?".to_string())
    );
    assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unresolved_order_by_aborts_before_any_call() {
    let api = Arc::new(FakeSemanticLayer::scripted(&["SUCCESSFUL"]));
    let fetcher = polling_fetcher(&api);

    let metrics = vec!["revenue".to_string()];
    fetcher.list_metrics().await.unwrap();
    fetcher.get_dimensions(&metrics).await.unwrap();
    let calls_before = api.total_calls();

    let mut query = params(&["revenue"]);
    query.order_by = Some(vec![OrderByParam {
        name: "profit".to_string(),
        descending: true,
    }]);

    let err = fetcher.query_metrics(&query).await.unwrap_err();
    assert_eq!(err, QueryError::OrderByNotFound("profit".to_string()));
    assert_eq!(api.total_calls(), calls_before);
    assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Submit/poll transport
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_poll_until_successful_after_29_running() {
    let mut statuses = vec!["RUNNING"; 29];
    statuses.push("SUCCESSFUL");
    let api = Arc::new(FakeSemanticLayer {
        json_result: json!("[{\"revenue\":100}]"),
        ..FakeSemanticLayer::scripted(&statuses)
    });
    let fetcher = polling_fetcher(&api);

    let started = tokio::time::Instant::now();
    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();

    assert_eq!(result, QueryResult::Success("[{\"revenue\":100}]".to_string()));
    assert_eq!(api.poll_calls.load(Ordering::SeqCst), 30);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(29) && elapsed < Duration::from_secs(30));

    let times = api.poll_times.lock().unwrap();
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(1) && gap < Duration::from_millis(1100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_poll_times_out_after_30_attempts() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let fetcher = polling_fetcher(&api);

    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();
    assert_eq!(result, QueryResult::Error(TIMEOUT_MESSAGE.to_string()));
    assert_eq!(api.poll_calls.load(Ordering::SeqCst), 30);
    assert_eq!(api.submit_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.poll_calls.load(Ordering::SeqCst), 30);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_poll_is_cut_off() {
    let api = Arc::new(FakeSemanticLayer {
        hang_polls: true,
        ..FakeSemanticLayer::running_forever()
    });
    let fetcher = polling_fetcher(&api);

    let started = tokio::time::Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(300), fetcher.query_metrics(&params(&["revenue"])))
        .await
        .expect("query must give up on its own");

    assert_eq!(result.unwrap(), QueryResult::Error(TIMEOUT_MESSAGE.to_string()));
    assert_eq!(api.poll_calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() <= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_slow_polls_stop_at_polling_budget() {
    let api = Arc::new(FakeSemanticLayer {
        poll_delay: Some(Duration::from_secs(5)),
        ..FakeSemanticLayer::running_forever()
    });
    let fetcher = polling_fetcher(&api);

    let started = tokio::time::Instant::now();
    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();

    assert_eq!(result, QueryResult::Error(TIMEOUT_MESSAGE.to_string()));
    assert!(api.poll_calls.load(Ordering::SeqCst) < 30);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn test_failed_query_error_is_normalized() {
    let api = Arc::new(FakeSemanticLayer {
        failure: Some(
            "INVALID_ARGUMENT: [FlightSQL] Failed to prepare statement: (InvalidArgument; Prepare) foo bar".to_string(),
        ),
        ..FakeSemanticLayer::scripted(&["RUNNING", "FAILED"])
    });
    let fetcher = polling_fetcher(&api);

    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();
    assert_eq!(result, QueryResult::Error("foo bar".to_string()));
    assert_eq!(api.poll_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_successful_without_rows() {
    let api = Arc::new(FakeSemanticLayer::scripted(&["SUCCESSFUL"]));
    let fetcher = polling_fetcher(&api);

    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();
    assert_eq!(result, QueryResult::Success("No results returned.".to_string()));
}

#[tokio::test]
async fn test_submit_api_error_surfaces_as_error_result() {
    let api = Arc::new(FakeSemanticLayer {
        submit_errors: true,
        ..FakeSemanticLayer::running_forever()
    });
    let fetcher = polling_fetcher(&api);

    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();
    assert_eq!(
        result,
        QueryResult::Error("Errors calling API: environment not found".to_string())
    );
    assert_eq!(api.poll_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submitted_variables_carry_resolved_order_by() {
    let api = Arc::new(FakeSemanticLayer::scripted(&["SUCCESSFUL"]));
    let fetcher = polling_fetcher(&api);

    let mut query = params(&["revenue"]);
    query.group_by = Some(vec![GroupByParam::time_dimension(
        "metric_time",
        Some("month".parse().unwrap()),
    )]);
    query.order_by = Some(vec![OrderByParam {
        name: "metric_time".to_string(),
        descending: true,
    }]);
    query.limit = Some(3);

    fetcher.query_metrics(&query).await.unwrap();

    let submitted = api.submitted.lock().unwrap();
    let vars = &submitted[0].variables;
    assert_eq!(vars["environmentId"], 7);
    assert_eq!(
        vars["orderBy"],
        json!([{"groupBy": {"name": "metric_time", "grain": "MONTH"}, "descending": true}])
    );
    assert_eq!(vars["limit"], 3);
}

#[tokio::test]
async fn test_dimension_cache_key_is_order_independent() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let fetcher = polling_fetcher(&api);

    fetcher
        .get_dimensions(&["m1".to_string(), "m2".to_string()])
        .await
        .unwrap();
    fetcher
        .get_dimensions(&["m2".to_string(), "m1".to_string()])
        .await
        .unwrap();
    assert_eq!(api.dimension_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Session transport
// =============================================================================

#[derive(Clone, Copy)]
enum SessionBehavior {
    Rows,
    Fail(&'static str),
    Hang,
    Panic,
}

struct FakeSessionClient {
    behavior: SessionBehavior,
    refuse_open: bool,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    sql: Arc<Mutex<Vec<String>>>,
}

impl FakeSessionClient {
    fn new(behavior: SessionBehavior) -> Self {
        Self {
            behavior,
            refuse_open: false,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            sql: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

struct FakeSession {
    behavior: SessionBehavior,
    closed: Arc<AtomicUsize>,
    sql: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SessionClient for FakeSessionClient {
    async fn open_session(&self) -> Result<Box<dyn QuerySession>, BackendError> {
        if self.refuse_open {
            return Err(BackendError::session("connection refused"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            behavior: self.behavior,
            closed: self.closed.clone(),
            sql: self.sql.clone(),
        }))
    }
}

#[async_trait]
impl QuerySession for FakeSession {
    async fn query(&mut self, request: &QueryRequest) -> Result<Vec<RecordBatch>, BackendError> {
        self.sql.lock().unwrap().push(request.to_semantic_sql());
        match self.behavior {
            SessionBehavior::Rows => {}
            SessionBehavior::Fail(msg) => return Err(BackendError::query_failed(msg)),
            SessionBehavior::Hang => std::future::pending::<()>().await,
            SessionBehavior::Panic => panic!("session crashed"),
        }
        let schema = Arc::new(Schema::new(vec![
            Field::new("metric_time__month", DataType::Utf8, false),
            Field::new("revenue", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["2024-01", "2024-02"])),
                Arc::new(Int64Array::from(vec![Some(10), None])),
            ],
        )
        .map_err(BackendError::from)?;
        Ok(vec![batch])
    }

    async fn close(self: Box<Self>) -> Result<(), BackendError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn session_fetcher(api: &Arc<FakeSemanticLayer>, client: FakeSessionClient) -> SemanticLayerFetcher {
    let backend: Arc<dyn QueryBackend> = Arc::new(SessionQueryBackend::new(Arc::new(client)));
    SemanticLayerFetcher::new(api.clone(), 7, backend)
}

#[tokio::test]
async fn test_session_rows_and_close() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let client = FakeSessionClient::new(SessionBehavior::Rows);
    let (opened, closed, sql) = (client.opened.clone(), client.closed.clone(), client.sql.clone());
    let fetcher = session_fetcher(&api, client);

    let mut query = params(&["revenue"]);
    query.group_by = Some(vec![GroupByParam::time_dimension(
        "metric_time",
        Some("month".parse().unwrap()),
    )]);
    query.order_by = Some(vec![OrderByParam {
        name: "revenue".to_string(),
        descending: true,
    }]);

    let result = fetcher.query_metrics(&query).await.unwrap();
    assert_eq!(
        result,
        QueryResult::Success(
            r#"[{"metric_time__month":"2024-01","revenue":10},{"metric_time__month":"2024-02","revenue":null}]"#
                .to_string()
        )
    );
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(
        sql.lock().unwrap()[0],
        "SELECT * FROM {{ semantic_layer.query(metrics=[\"revenue\"], \
         group_by=[TimeDimension(\"metric_time\", \"month\")], \
         order_by=[Metric(\"revenue\").descending(True)]) }}"
    );
    assert_eq!(api.poll_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_closed_when_query_fails() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let client = FakeSessionClient::new(SessionBehavior::Fail(
        r#"QueryFailedError(["INVALID_ARGUMENT: [FlightSQL] (InvalidArgument; ExecuteQuery) metric_time grain is invalid"])"#,
    ));
    let (opened, closed) = (client.opened.clone(), client.closed.clone());
    let fetcher = session_fetcher(&api, client);

    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();
    assert_eq!(result, QueryResult::Error("metric_time grain is invalid".to_string()));
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_open_failure() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let mut client = FakeSessionClient::new(SessionBehavior::Rows);
    client.refuse_open = true;
    let closed = client.closed.clone();
    let fetcher = session_fetcher(&api, client);

    let result = fetcher.query_metrics(&params(&["revenue"])).await.unwrap();
    assert_eq!(result, QueryResult::Error("connection refused".to_string()));
    assert_eq!(closed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_closed_when_caller_gives_up() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let client = FakeSessionClient::new(SessionBehavior::Hang);
    let (opened, closed) = (client.opened.clone(), client.closed.clone());
    let fetcher = session_fetcher(&api, client);

    let query = params(&["revenue"]);
    let abandoned = tokio::time::timeout(Duration::from_millis(50), fetcher.query_metrics(&query)).await;
    assert!(abandoned.is_err());
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    for _ in 0..100 {
        if closed.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_closed_when_query_panics() {
    let api = Arc::new(FakeSemanticLayer::running_forever());
    let client = FakeSessionClient::new(SessionBehavior::Panic);
    let closed = client.closed.clone();
    let fetcher = Arc::new(session_fetcher(&api, client));

    let task = tokio::spawn({
        let fetcher = fetcher.clone();
        async move { fetcher.query_metrics(&params(&["revenue"])).await }
    });
    assert!(task.await.unwrap_err().is_panic());

    for _ in 0..100 {
        if closed.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}
