//! Discovery tools: model listings, details and lineage.

use crate::types::{parse_args, Tool, ToolError, ToolInputSchema, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tessera_discovery::{DiscoveryError, ModelFilter, ModelSelector, ModelsFetcher};

/// Internal time spine model, never useful to callers.
const TIME_SPINE_MODEL: &str = "metricflow_time_spine";

pub fn tools(fetcher: Arc<ModelsFetcher>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListModelsTool::marts(fetcher.clone())),
        Arc::new(ListModelsTool::all(fetcher.clone())),
        Arc::new(ModelDetailsTool { fetcher: fetcher.clone() }),
        Arc::new(LineageTool::parents(fetcher.clone())),
        Arc::new(LineageTool::children(fetcher)),
    ]
}

fn discovery_error(e: DiscoveryError) -> Result<ToolResult, ToolError> {
    Ok(ToolResult::error(e.to_string()))
}

#[derive(Deserialize)]
struct ModelArgs {
    model_name: String,
    #[serde(default)]
    unique_id: Option<String>,
}

impl ModelArgs {
    fn selector(self) -> ModelSelector {
        ModelSelector::new(self.model_name, self.unique_id)
    }
}

fn model_schema() -> ToolInputSchema {
    ToolInputSchema::with_properties(
        json!({
            "model_name": {"type": "string", "description": "Name of the model"},
            "unique_id": {
                "type": "string",
                "description": "Unique id of the model (e.g. model.project.orders); preferred over the name when given"
            }
        }),
        &["model_name"],
    )
}

pub struct ListModelsTool {
    fetcher: Arc<ModelsFetcher>,
    filter: ModelFilter,
}

impl ListModelsTool {
    pub fn marts(fetcher: Arc<ModelsFetcher>) -> Self {
        Self {
            fetcher,
            filter: ModelFilter::Marts,
        }
    }

    pub fn all(fetcher: Arc<ModelsFetcher>) -> Self {
        Self {
            fetcher,
            filter: ModelFilter::All,
        }
    }
}

#[async_trait]
impl Tool for ListModelsTool {
    fn name(&self) -> &str {
        match self.filter {
            ModelFilter::Marts => "get_mart_models",
            ModelFilter::All => "get_all_models",
        }
    }

    fn description(&self) -> &str {
        match self.filter {
            ModelFilter::Marts => "List the mart models (the presentation layer), most queried first.",
            ModelFilter::All => "List all models in the project, most queried first.",
        }
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::empty()
    }

    async fn execute(&self, _args: Value) -> Result<ToolResult, ToolError> {
        let mut models = match self.fetcher.fetch_models(self.filter).await {
            Ok(models) => models,
            Err(e) => return discovery_error(e),
        };
        if self.filter == ModelFilter::Marts {
            models.retain(|m| m.name != TIME_SPINE_MODEL);
        }
        ToolResult::json(&models)
    }
}

pub struct ModelDetailsTool {
    fetcher: Arc<ModelsFetcher>,
}

#[async_trait]
impl Tool for ModelDetailsTool {
    fn name(&self) -> &str {
        "get_model_details"
    }

    fn description(&self) -> &str {
        "Get a model's compiled SQL, location and catalog columns."
    }

    fn input_schema(&self) -> ToolInputSchema {
        model_schema()
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: ModelArgs = parse_args(args)?;
        match self.fetcher.fetch_model_details(&args.selector()).await {
            Ok(Some(details)) => ToolResult::json(&details),
            Ok(None) => ToolResult::json(&json!({})),
            Err(e) => discovery_error(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Parents,
    Children,
}

pub struct LineageTool {
    fetcher: Arc<ModelsFetcher>,
    direction: Direction,
}

impl LineageTool {
    pub fn parents(fetcher: Arc<ModelsFetcher>) -> Self {
        Self {
            fetcher,
            direction: Direction::Parents,
        }
    }

    pub fn children(fetcher: Arc<ModelsFetcher>) -> Self {
        Self {
            fetcher,
            direction: Direction::Children,
        }
    }
}

#[async_trait]
impl Tool for LineageTool {
    fn name(&self) -> &str {
        match self.direction {
            Direction::Parents => "get_model_parents",
            Direction::Children => "get_model_children",
        }
    }

    fn description(&self) -> &str {
        match self.direction {
            Direction::Parents => "Get the direct upstream resources (models, sources, seeds, ...) of a model.",
            Direction::Children => "Get the direct downstream resources (models, tests, exposures, ...) of a model.",
        }
    }

    fn input_schema(&self) -> ToolInputSchema {
        model_schema()
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let selector = parse_args::<ModelArgs>(args)?.selector();
        let nodes = match self.direction {
            Direction::Parents => self.fetcher.fetch_model_parents(&selector).await,
            Direction::Children => self.fetcher.fetch_model_children(&selector).await,
        };
        match nodes {
            Ok(nodes) => ToolResult::json(&nodes),
            Err(e) => discovery_error(e),
        }
    }
}
