//! `tessera config`: validate settings and show what the server would use.

use anyhow::Result;
use serde_json::{json, Value};
use tessera_mcp::{Config, Settings};

pub fn run(settings: Settings, as_json: bool) -> Result<()> {
    let config = Config::from_settings(settings)?;
    let summary = summarize(&config);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Semantic layer: {}", describe(&summary["semantic_layer"]));
    println!("Discovery:      {}", describe(&summary["discovery"]));
    println!("CLI tools:      {}", describe(&summary["cli"]));
    println!("Max response:   {} bytes", config.max_response_bytes);
    if let Some(path) = &config.usage_log {
        println!("Usage log:      {}", path.display());
    }
    Ok(())
}

/// Resolved configuration without credentials.
fn summarize(config: &Config) -> Value {
    json!({
        "semantic_layer": config.semantic_layer.as_ref().map(|sl| json!({
            "url": sl.graphql_url(),
            "environment_id": sl.environment_id,
            "transport": sl.transport.to_string(),
        })),
        "discovery": config.discovery.as_ref().map(|d| json!({
            "url": d.url,
            "environment_id": d.environment_id,
        })),
        "cli": config.cli.as_ref().map(|cli| json!({
            "executable": cli.executable,
            "project_dir": cli.project_dir.display().to_string(),
        })),
        "max_response_bytes": config.max_response_bytes,
        "usage_log": config.usage_log.as_ref().map(|p| p.display().to_string()),
    })
}

fn describe(section: &Value) -> String {
    match section.as_object() {
        None => "disabled".to_string(),
        Some(fields) => fields
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}={}", key, s),
                other => format!("{}={}", key, other),
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}
