//! Metadata cache for metrics, dimensions and entities.
//!
//! Metric listings are fetched once per cache instance. Dimension and entity
//! listings depend on the requested metric set and are cached per set, keyed
//! by the sorted, comma-joined metric names. Failed fetches are not cached.

use crate::types::{Dimension, DimensionType, Entity, Granularity, Metric};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tessera_graphql::{data_at, GraphqlError, GraphqlRequest, GraphqlTransport};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

const GET_METRICS: &str = r#"
query GetMetrics($environmentId: BigInt!) {
  metrics(environmentId: $environmentId) {
    name
    label
    description
    type
  }
}
"#;

const GET_DIMENSIONS: &str = r#"
query GetDimensions($environmentId: BigInt!, $metrics: [MetricInput!]!) {
  dimensions(environmentId: $environmentId, metrics: $metrics) {
    name
    label
    description
    type
    queryableGranularities
    queryableTimeGranularities
  }
}
"#;

const GET_ENTITIES: &str = r#"
query GetEntities($environmentId: BigInt!, $metrics: [MetricInput!]!) {
  entities(environmentId: $environmentId, metrics: $metrics) {
    name
    description
    type
  }
}
"#;

/// Cache key for a metric set: order-independent.
pub fn metric_set_key<S: AsRef<str>>(metrics: &[S]) -> String {
    let mut names: Vec<&str> = metrics.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.join(",")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDimension {
    name: String,
    #[serde(rename = "type")]
    dimension_type: DimensionType,
    label: Option<String>,
    description: Option<String>,
    queryable_granularities: Option<Vec<Granularity>>,
    queryable_time_granularities: Option<Vec<Granularity>>,
}

impl From<RawDimension> for Dimension {
    fn from(raw: RawDimension) -> Self {
        let mut granularities = raw.queryable_granularities.unwrap_or_default();
        granularities.extend(raw.queryable_time_granularities.unwrap_or_default());
        Dimension {
            name: raw.name,
            dimension_type: raw.dimension_type,
            label: raw.label,
            description: raw.description,
            granularities,
        }
    }
}

/// Lazily populated metadata owned by one fetcher.
pub struct MetadataCache {
    transport: Arc<dyn GraphqlTransport>,
    environment_id: i64,
    metrics: OnceCell<Vec<Metric>>,
    dimensions: RwLock<HashMap<String, Vec<Dimension>>>,
    entities: RwLock<HashMap<String, Vec<Entity>>>,
}

impl MetadataCache {
    pub fn new(transport: Arc<dyn GraphqlTransport>, environment_id: i64) -> Self {
        Self {
            transport,
            environment_id,
            metrics: OnceCell::new(),
            dimensions: RwLock::new(HashMap::new()),
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Every metric in the environment.
    ///
    /// Concurrent first calls share one fetch.
    pub async fn list_metrics(&self) -> Result<Vec<Metric>, GraphqlError> {
        let metrics = self
            .metrics
            .get_or_try_init(|| async {
                let request = self.request(GET_METRICS);
                self.fetch_list(&request, "metrics").await
            })
            .await?;
        Ok(metrics.clone())
    }

    /// Dimensions queryable together with `metrics`.
    pub async fn get_dimensions<S: AsRef<str>>(&self, metrics: &[S]) -> Result<Vec<Dimension>, GraphqlError> {
        let key = metric_set_key(metrics);
        if let Some(cached) = self.dimensions.read().await.get(&key) {
            return Ok(cached.clone());
        }

        debug!("Fetching dimensions for [{}]", key);
        let request = self.request(GET_DIMENSIONS).variable("metrics", metric_inputs(metrics));
        let raw: Vec<RawDimension> = self.fetch_list(&request, "dimensions").await?;
        let dimensions: Vec<Dimension> = raw.into_iter().map(Dimension::from).collect();

        self.dimensions.write().await.insert(key, dimensions.clone());
        Ok(dimensions)
    }

    /// Entities associated with `metrics`.
    pub async fn get_entities<S: AsRef<str>>(&self, metrics: &[S]) -> Result<Vec<Entity>, GraphqlError> {
        let key = metric_set_key(metrics);
        if let Some(cached) = self.entities.read().await.get(&key) {
            return Ok(cached.clone());
        }

        debug!("Fetching entities for [{}]", key);
        let request = self.request(GET_ENTITIES).variable("metrics", metric_inputs(metrics));
        let entities: Vec<Entity> = self.fetch_list(&request, "entities").await?;

        self.entities.write().await.insert(key, entities.clone());
        Ok(entities)
    }

    fn request(&self, document: &str) -> GraphqlRequest {
        GraphqlRequest::new(document).variable("environmentId", self.environment_id)
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        request: &GraphqlRequest,
        field: &str,
    ) -> Result<Vec<T>, GraphqlError> {
        let response = self.transport.execute(request).await?;
        let list = data_at(&response, &[field])?;
        serde_json::from_value(list.clone())
            .map_err(|e| GraphqlError::malformed(format!("invalid `data.{}`: {}", field, e)))
    }
}

fn metric_inputs<S: AsRef<str>>(metrics: &[S]) -> Value {
    Value::Array(metrics.iter().map(|m| json!({ "name": m.as_ref() })).collect())
}
