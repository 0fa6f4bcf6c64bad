//! MCP Tool Implementations
//!
//! - **Semantic layer**: list_metrics, get_dimensions, get_entities, query_metrics
//! - **Discovery**: get_mart_models, get_all_models, get_model_details, get_model_parents, get_model_children
//! - **CLI**: build, compile, docs, list, parse, run, test, show
//!
//! Which groups are registered depends on the enabled services in [`Config`].

mod registry;

pub mod cli;
pub mod discovery;
pub mod semantic_layer;

pub use registry::ToolRegistry;

use crate::cli_runner::CliRunner;
use crate::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;
use tessera_discovery::ModelsFetcher;
use tessera_graphql::{GraphqlTransport, HttpGraphqlClient};
use tracing::info;

/// Registry with the tools of every enabled service.
pub fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    if let Some(connection) = &config.semantic_layer {
        let fetcher = connection
            .fetcher()
            .context("Failed to set up the semantic layer client")?;
        info!(
            "Semantic layer tools enabled ({} transport, {})",
            connection.transport, connection.base_url
        );
        for tool in semantic_layer::tools(Arc::new(fetcher)) {
            registry.register(tool);
        }
    }

    if let Some(discovery) = &config.discovery {
        let transport: Arc<dyn GraphqlTransport> = Arc::new(HttpGraphqlClient::new(&discovery.url, &discovery.token));
        let fetcher = ModelsFetcher::new(transport, discovery.environment_id);
        info!("Discovery tools enabled ({})", discovery.url);
        for tool in discovery::tools(Arc::new(fetcher)) {
            registry.register(tool);
        }
    }

    if let Some(cli) = &config.cli {
        info!("CLI tools enabled ({} in {})", cli.executable, cli.project_dir.display());
        for tool in cli::tools(Arc::new(CliRunner::new(&cli.executable, &cli.project_dir))) {
            registry.register(tool);
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::path::PathBuf;

    #[test]
    fn test_registry_follows_enabled_services() {
        let config = Config::from_settings(Settings {
            host: Some("cloud.example.com".to_string()),
            prod_environment_id: Some("1".to_string()),
            token: Some("t".to_string()),
            disable_semantic_layer: true,
            project_dir: Some(PathBuf::from("/work/project")),
            ..Settings::default()
        })
        .unwrap();

        let registry = build_registry(&config).unwrap();
        assert!(registry.has_tool("get_mart_models"));
        assert!(registry.has_tool("get_model_children"));
        assert!(registry.has_tool("show"));
        assert!(!registry.has_tool("query_metrics"));
        assert_eq!(registry.len(), 13);
    }
}
