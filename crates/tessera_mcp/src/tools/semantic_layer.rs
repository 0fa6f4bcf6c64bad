//! Semantic layer tools: metric metadata and metric queries.

use crate::types::{parse_args, Tool, ToolError, ToolInputSchema, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tessera_semantic::{QueryParams, QueryResult, SemanticLayerFetcher};

#[derive(Deserialize)]
struct MetricsArgs {
    metrics: Vec<String>,
}

fn metrics_schema() -> ToolInputSchema {
    ToolInputSchema::with_properties(
        json!({
            "metrics": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Metric names, as returned by list_metrics"
            }
        }),
        &["metrics"],
    )
}

/// Every semantic layer tool, sharing one fetcher (and its metadata cache).
pub fn tools(fetcher: Arc<SemanticLayerFetcher>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListMetricsTool { fetcher: fetcher.clone() }),
        Arc::new(GetDimensionsTool { fetcher: fetcher.clone() }),
        Arc::new(GetEntitiesTool { fetcher: fetcher.clone() }),
        Arc::new(QueryMetricsTool { fetcher }),
    ]
}

pub struct ListMetricsTool {
    fetcher: Arc<SemanticLayerFetcher>,
}

#[async_trait]
impl Tool for ListMetricsTool {
    fn name(&self) -> &str {
        "list_metrics"
    }

    fn description(&self) -> &str {
        "List all metrics defined in the semantic layer, with their type and description."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::empty()
    }

    async fn execute(&self, _args: Value) -> Result<ToolResult, ToolError> {
        match self.fetcher.list_metrics().await {
            Ok(metrics) => ToolResult::json(&metrics),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

pub struct GetDimensionsTool {
    fetcher: Arc<SemanticLayerFetcher>,
}

#[async_trait]
impl Tool for GetDimensionsTool {
    fn name(&self) -> &str {
        "get_dimensions"
    }

    fn description(&self) -> &str {
        "Get the dimensions shared by the given metrics. Time dimensions list the granularities they support."
    }

    fn input_schema(&self) -> ToolInputSchema {
        metrics_schema()
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: MetricsArgs = parse_args(args)?;
        match self.fetcher.get_dimensions(&args.metrics).await {
            Ok(dimensions) => ToolResult::json(&dimensions),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

pub struct GetEntitiesTool {
    fetcher: Arc<SemanticLayerFetcher>,
}

#[async_trait]
impl Tool for GetEntitiesTool {
    fn name(&self) -> &str {
        "get_entities"
    }

    fn description(&self) -> &str {
        "Get the entities (join keys) available for the given metrics."
    }

    fn input_schema(&self) -> ToolInputSchema {
        metrics_schema()
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: MetricsArgs = parse_args(args)?;
        match self.fetcher.get_entities(&args.metrics).await {
            Ok(entities) => ToolResult::json(&entities),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

pub struct QueryMetricsTool {
    fetcher: Arc<SemanticLayerFetcher>,
}

#[async_trait]
impl Tool for QueryMetricsTool {
    fn name(&self) -> &str {
        "query_metrics"
    }

    fn description(&self) -> &str {
        "Query metrics, optionally grouped by dimensions or entities, filtered, ordered and limited. \
         Returns the rows as JSON records."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            json!({
                "metrics": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Metrics to compute"
                },
                "group_by": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "type": {"type": "string", "enum": ["categorical_dimension", "time_dimension", "entity"]},
                            "grain": {"type": "string", "description": "Time granularity, only for time dimensions"}
                        },
                        "required": ["name", "type"]
                    }
                },
                "order_by": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "A selected metric or group-by name"},
                            "descending": {"type": "boolean"}
                        },
                        "required": ["name"]
                    }
                },
                "where": {
                    "type": "string",
                    "description": "Filter expression, e.g. {{ Dimension('order__region') }} = 'EU'"
                },
                "limit": {"type": "integer", "minimum": 0}
            }),
            &["metrics"],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let params: QueryParams = parse_args(args)?;
        match self.fetcher.query_metrics(&params).await {
            Ok(QueryResult::Success(rows)) => Ok(ToolResult::text(rows)),
            Ok(QueryResult::Error(message)) => Ok(ToolResult::error(message)),
            Err(e) => Err(ToolError::InvalidParams(e.to_string())),
        }
    }
}
