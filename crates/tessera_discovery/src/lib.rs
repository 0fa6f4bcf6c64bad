//! Model discovery against the metadata GraphQL API.
//!
//! [`ModelsFetcher`] lists models (paginated, most-queried first) and looks
//! up details and lineage for a single model.

mod error;
mod models;
mod queries;

pub use error::DiscoveryError;
pub use models::{CatalogColumn, LineageNode, ModelCatalog, ModelDetails, ModelFilter, ModelSelector, ModelSummary};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tessera_graphql::{data_at, GraphqlRequest, GraphqlTransport};
use tracing::debug;

/// Models requested per page.
pub const PAGE_SIZE: usize = 100;
/// Listing stops once this many models have been collected.
pub const MAX_NUM_MODELS: usize = 1000;

const MODELS_PATH: &[&str] = &["environment", "applied", "models"];

pub struct ModelsFetcher {
    transport: Arc<dyn GraphqlTransport>,
    environment_id: i64,
}

impl ModelsFetcher {
    pub fn new(transport: Arc<dyn GraphqlTransport>, environment_id: i64) -> Self {
        Self {
            transport,
            environment_id,
        }
    }

    /// Page through applied models until the cursor stops advancing.
    pub async fn fetch_models(&self, filter: ModelFilter) -> Result<Vec<ModelSummary>, DiscoveryError> {
        let mut models = Vec::new();
        let mut cursor = String::new();

        while models.len() < MAX_NUM_MODELS {
            let request = GraphqlRequest::new(queries::GET_MODELS)
                .variable("environmentId", self.environment_id)
                .variable("after", cursor.clone())
                .variable("first", PAGE_SIZE)
                .variable("modelsFilter", filter.to_variable())
                .variable("sort", json!({"field": "queryUsageCount", "direction": "desc"}));

            let response = self.transport.execute(&request).await?;
            let connection = data_at(&response, MODELS_PATH)?;
            let page: Vec<ModelSummary> = nodes(connection)?;
            debug!("Fetched {} models (after cursor {:?})", page.len(), cursor);
            models.extend(page);

            let next = connection
                .pointer("/pageInfo/endCursor")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if next == cursor {
                break;
            }
            cursor = next;
        }

        Ok(models)
    }

    /// Details for one model; `None` when nothing matches.
    pub async fn fetch_model_details(&self, selector: &ModelSelector) -> Result<Option<ModelDetails>, DiscoveryError> {
        let found: Vec<ModelDetails> = self.fetch_single(queries::GET_MODEL_DETAILS, selector).await?;
        Ok(found.into_iter().next())
    }

    /// Direct upstream nodes of a model.
    pub async fn fetch_model_parents(&self, selector: &ModelSelector) -> Result<Vec<LineageNode>, DiscoveryError> {
        self.fetch_lineage(queries::GET_MODEL_PARENTS, "parents", selector).await
    }

    /// Direct downstream nodes of a model.
    pub async fn fetch_model_children(&self, selector: &ModelSelector) -> Result<Vec<LineageNode>, DiscoveryError> {
        self.fetch_lineage(queries::GET_MODEL_CHILDREN, "children", selector).await
    }

    async fn fetch_lineage(
        &self,
        document: &str,
        field: &str,
        selector: &ModelSelector,
    ) -> Result<Vec<LineageNode>, DiscoveryError> {
        let found: Vec<Value> = self.fetch_single(document, selector).await?;
        let Some(node) = found.into_iter().next() else {
            return Ok(Vec::new());
        };
        match node.get(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(list) => serde_json::from_value(list.clone())
                .map_err(|e| DiscoveryError::Malformed(format!("invalid `{}`: {}", field, e))),
        }
    }

    async fn fetch_single<T: DeserializeOwned>(
        &self,
        document: &str,
        selector: &ModelSelector,
    ) -> Result<Vec<T>, DiscoveryError> {
        let request = GraphqlRequest::new(document)
            .variable("environmentId", self.environment_id)
            .variable("modelsFilter", selector.to_variable())
            .variable("first", 1);
        let response = self.transport.execute(&request).await?;
        nodes(data_at(&response, MODELS_PATH)?)
    }
}

/// `edges[].node` of a connection, skipping entries that are not objects.
fn nodes<T: DeserializeOwned>(connection: &Value) -> Result<Vec<T>, DiscoveryError> {
    let Some(edges) = connection.get("edges").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    edges
        .iter()
        .filter_map(|edge| edge.get("node").filter(|node| node.is_object()))
        .map(|node| {
            serde_json::from_value(node.clone()).map_err(|e| DiscoveryError::Malformed(format!("invalid model node: {}", e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_skips_malformed_edges() {
        let connection = json!({"edges": [
            {"node": {"name": "orders", "uniqueId": "model.shop.orders", "description": null}},
            {"cursor": "x"},
            {"node": null},
            "junk"
        ]});
        let parsed: Vec<ModelSummary> = nodes(&connection).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "orders");
    }

    #[test]
    fn test_nodes_missing_edges() {
        let parsed: Vec<ModelSummary> = nodes(&json!({"edges": null})).unwrap();
        assert!(parsed.is_empty());
    }
}
