//! The semantic layer fetcher: validation, metadata and query execution.

use crate::error::{BackendError, QueryError};
use crate::executor::{describe_backend_error, QueryBackend};
use crate::metadata::MetadataCache;
use crate::normalize::NoiseTable;
use crate::request::{resolve_order_by, QueryRequest};
use crate::types::{Dimension, Entity, GroupByParam, Metric, OrderByParam, QueryResult};
use crate::validate::validate_query_params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_graphql::{GraphqlError, GraphqlTransport};
use tracing::{debug, info};

/// Parameters of a metric query as received from a tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub metrics: Vec<String>,
    #[serde(default)]
    pub group_by: Option<Vec<GroupByParam>>,
    #[serde(default)]
    pub order_by: Option<Vec<OrderByParam>>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Entry point for semantic layer tools.
///
/// Owns its metadata cache; two fetchers never share cached state.
pub struct SemanticLayerFetcher {
    metadata: MetadataCache,
    backend: Arc<dyn QueryBackend>,
    noise: NoiseTable,
}

impl SemanticLayerFetcher {
    pub fn new(metadata_transport: Arc<dyn GraphqlTransport>, environment_id: i64, backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            metadata: MetadataCache::new(metadata_transport, environment_id),
            backend,
            noise: NoiseTable::default(),
        }
    }

    pub fn with_noise_table(mut self, noise: NoiseTable) -> Self {
        self.noise = noise;
        self
    }

    pub async fn list_metrics(&self) -> Result<Vec<Metric>, GraphqlError> {
        self.metadata.list_metrics().await
    }

    pub async fn get_dimensions(&self, metrics: &[String]) -> Result<Vec<Dimension>, GraphqlError> {
        self.metadata.get_dimensions(metrics).await
    }

    pub async fn get_entities(&self, metrics: &[String]) -> Result<Vec<Entity>, GraphqlError> {
        self.metadata.get_entities(metrics).await
    }

    /// Validate, resolve and run a metric query.
    ///
    /// Every backend failure is folded into [`QueryResult::Error`]. The only
    /// `Err` is an order-by naming something the request does not select,
    /// which aborts before the query is sent.
    pub async fn query_metrics(&self, params: &QueryParams) -> Result<QueryResult, QueryError> {
        let group_by = params.group_by.clone().unwrap_or_default();

        match validate_query_params(&self.metadata, &params.metrics, &group_by).await {
            Ok(None) => {}
            Ok(Some(message)) => {
                debug!("Query rejected: {}", message);
                return Ok(QueryResult::Error(message));
            }
            Err(e) => return Ok(self.error_result(BackendError::from(e))),
        }

        let order_by = match &params.order_by {
            Some(order_by) => resolve_order_by(order_by, &params.metrics, &group_by)?,
            None => Vec::new(),
        };

        let request = QueryRequest::new(params.metrics.clone())
            .group_by(group_by)
            .order_by(order_by)
            .where_clause(params.where_clause.clone())
            .limit(params.limit);

        info!("Running query for metrics [{}]", params.metrics.join(", "));
        match self.backend.run(&request).await {
            Ok(rows) => Ok(QueryResult::Success(rows)),
            Err(e) => Ok(self.error_result(e)),
        }
    }

    fn error_result(&self, err: BackendError) -> QueryResult {
        let message = describe_backend_error(&err, &self.noise);
        debug!("Query failed: {}", message);
        QueryResult::Error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_params_from_tool_arguments() {
        let params: QueryParams = serde_json::from_value(json!({
            "metrics": ["revenue"],
            "group_by": [{"name": "metric_time", "type": "time_dimension", "grain": "MONTH"}],
            "order_by": [{"name": "revenue", "descending": true}],
            "where": "{{ Dimension('region') }} = 'EU'",
            "limit": 10
        }))
        .unwrap();

        assert_eq!(params.where_clause.as_deref(), Some("{{ Dimension('region') }} = 'EU'"));
        assert_eq!(params.group_by.as_ref().map(Vec::len), Some(1));
        assert_eq!(params.limit, Some(10));

        let minimal: QueryParams = serde_json::from_value(json!({"metrics": ["revenue"]})).unwrap();
        assert!(minimal.group_by.is_none() && minimal.order_by.is_none());
    }

    #[test]
    fn test_negative_limit_rejected() {
        let result = serde_json::from_value::<QueryParams>(json!({"metrics": ["m"], "limit": -1}));
        assert!(result.is_err());
    }
}
