//! Submit/poll query transport over GraphQL.
//!
//! ```text
//! SUBMITTED -> RUNNING -> SUCCESSFUL | FAILED
//!                     \-> TIMED_OUT (attempt budget exhausted)
//! ```
//!
//! A query reaching a terminal phase is never resubmitted.

use crate::error::BackendError;
use crate::executor::QueryBackend;
use crate::request::QueryRequest;
use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tessera_graphql::{data_at, GraphqlError, GraphqlRequest, GraphqlTransport};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const CREATE_QUERY: &str = r#"
mutation CreateQuery(
  $environmentId: BigInt!,
  $metrics: [MetricInput!]!,
  $groupBy: [GroupByInput!],
  $where: [WhereInput!],
  $orderBy: [OrderByInput!],
  $limit: Int
) {
  createQuery(
    environmentId: $environmentId,
    metrics: $metrics,
    groupBy: $groupBy,
    where: $where,
    orderBy: $orderBy,
    limit: $limit
  ) {
    queryId
  }
}
"#;

const GET_QUERY_RESULT: &str = r#"
query GetQueryResult($environmentId: BigInt!, $queryId: String!) {
  query(environmentId: $environmentId, queryId: $queryId) {
    status
    error
    jsonResult(encoded: false)
  }
}
"#;

pub const NO_RESULTS: &str = "No results returned.";

/// Polling cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Bound on a single submit or status request.
    pub request_timeout: Duration,
}

impl PollConfig {
    /// Wall-clock ceiling for the polling phase, however slow each poll is.
    pub fn polling_budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 30,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Lifecycle of a submitted query as observed by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Submitted,
    Running,
    Successful,
    Failed,
    TimedOut,
}

impl PollPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PollPhase::Successful | PollPhase::Failed | PollPhase::TimedOut)
    }
}

/// Status reported by the backend for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Pending,
    Running,
    Compiled,
    Successful,
    Failed,
    #[serde(other)]
    Unknown,
}

impl QueryStatus {
    fn phase(self) -> PollPhase {
        match self {
            QueryStatus::Successful => PollPhase::Successful,
            QueryStatus::Failed => PollPhase::Failed,
            _ => PollPhase::Running,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryState {
    status: QueryStatus,
    error: Option<String>,
    json_result: Option<serde_json::Value>,
}

/// Backend that submits a query and polls its status until terminal.
pub struct PollingQueryBackend {
    transport: Arc<dyn GraphqlTransport>,
    environment_id: i64,
    config: PollConfig,
}

impl PollingQueryBackend {
    pub fn new(transport: Arc<dyn GraphqlTransport>, environment_id: i64) -> Self {
        Self {
            transport,
            environment_id,
            config: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    async fn submit(&self, request: &QueryRequest) -> Result<String, BackendError> {
        let mut gql = GraphqlRequest::new(CREATE_QUERY);
        gql.variables = request.graphql_variables();
        let gql = gql.variable("environmentId", self.environment_id);

        let response = self.transport.execute(&gql).await?;
        let query_id = data_at(&response, &["createQuery", "queryId"])?;
        let query_id = match query_id {
            serde_json::Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        Ok(query_id)
    }

    async fn poll_once(&self, query_id: &str) -> Result<QueryState, BackendError> {
        let gql = GraphqlRequest::new(GET_QUERY_RESULT)
            .variable("environmentId", self.environment_id)
            .variable("queryId", query_id);
        let response = self.transport.execute(&gql).await?;
        let state = data_at(&response, &["query"])?;
        serde_json::from_value(state.clone())
            .map_err(|e| GraphqlError::malformed(format!("invalid `data.query`: {}", e)).into())
    }

    /// Poll until a terminal status, counting attempts into `attempts` so
    /// the caller can report them if the deadline cuts the loop short.
    async fn poll_until_terminal(&self, query_id: &str, attempts: &mut u32) -> Result<String, BackendError> {
        while *attempts < self.config.max_attempts {
            if *attempts > 0 {
                tokio::time::sleep(self.config.interval).await;
            }
            *attempts += 1;

            let state = self.bounded(self.poll_once(query_id), *attempts).await?;
            debug!("Query {} attempt {}: {:?}", query_id, attempts, state.status);

            match state.status.phase() {
                PollPhase::Failed => {
                    return Err(BackendError::query_failed(
                        state.error.unwrap_or_else(|| "Query failed.".to_string()),
                    ));
                }
                PollPhase::Successful => return Ok(render_result(state.json_result)),
                _ => {}
            }
        }
        Err(BackendError::TimedOut { attempts: *attempts })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
        attempts: u32,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Semantic layer request exceeded {:?}", self.config.request_timeout);
                Err(BackendError::TimedOut { attempts })
            }
        }
    }
}

#[async_trait]
impl QueryBackend for PollingQueryBackend {
    async fn run(&self, request: &QueryRequest) -> Result<String, BackendError> {
        let query_id = self.bounded(self.submit(request), 0).await?;
        info!("Submitted query {}", query_id);

        let deadline = Instant::now() + self.config.polling_budget();
        let mut attempts = 0;
        let outcome = tokio::time::timeout_at(deadline, self.poll_until_terminal(&query_id, &mut attempts)).await;

        match outcome {
            Ok(Err(BackendError::TimedOut { .. })) | Err(_) => {
                info!("Query {} did not finish after {} polls", query_id, attempts);
                Err(BackendError::TimedOut { attempts })
            }
            Ok(result) => result,
        }
    }
}

fn render_result(json_result: Option<serde_json::Value>) -> String {
    use serde_json::Value;
    match json_result {
        None | Some(Value::Null) => NO_RESULTS.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => NO_RESULTS.to_string(),
        Some(Value::String(s)) => s,
        Some(value) => value.to_string(),
    }
}
