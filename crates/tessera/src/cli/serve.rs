//! `tessera serve`: run the MCP server on stdio.

use anyhow::{Context, Result};
use tessera_mcp::{build_registry, Config, McpServer, McpServerConfig, Settings, UsageTracker};
use tracing::info;

pub fn run(settings: Settings) -> Result<()> {
    let config = Config::from_settings(settings)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    let registry = build_registry(&config)?;
    let usage = match &config.usage_log {
        Some(path) => UsageTracker::open(path),
        None => UsageTracker::disabled(),
    }
    .with_environment_id(config.environment_id);

    let server_config = McpServerConfig {
        max_response_bytes: config.max_response_bytes,
        ..McpServerConfig::default()
    };

    info!("Serving {} tools over stdio", registry.len());
    McpServer::new(server_config, registry, usage).run_stdio().await
}
