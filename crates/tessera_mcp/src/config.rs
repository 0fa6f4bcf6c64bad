//! Server configuration
//!
//! [`Settings`] is the raw input (flags and environment); [`Config`] is the
//! validated result with service endpoints resolved from the host.

use std::path::PathBuf;
use tessera_semantic::{PollConfig, SemanticLayerConnection, TransportKind};
use thiserror::Error;

pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
pub const DEFAULT_CLI_PATH: &str = "dbt";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Errors found in configuration:\n\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

/// Unvalidated settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: Option<String>,
    pub prod_environment_id: Option<String>,
    pub token: Option<String>,
    pub account_prefix: Option<String>,
    pub project_dir: Option<PathBuf>,
    pub cli_path: String,
    pub disable_cli: bool,
    pub disable_semantic_layer: bool,
    pub disable_discovery: bool,
    pub sl_transport: Option<String>,
    pub max_response_bytes: usize,
    pub usage_log: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: None,
            prod_environment_id: None,
            token: None,
            account_prefix: None,
            project_dir: None,
            cli_path: DEFAULT_CLI_PATH.to_string(),
            disable_cli: false,
            disable_semantic_layer: false,
            disable_discovery: false,
            sl_transport: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            usage_log: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub url: String,
    pub token: String,
    pub environment_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub executable: String,
    pub project_dir: PathBuf,
}

/// Validated configuration; a service is `None` when disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub semantic_layer: Option<SemanticLayerConnection>,
    pub discovery: Option<DiscoveryConfig>,
    pub cli: Option<CliConfig>,
    pub max_response_bytes: usize,
    pub usage_log: Option<PathBuf>,
    pub environment_id: Option<i64>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Validate settings, reporting every problem at once.
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        let remote_enabled = !settings.disable_semantic_layer || !settings.disable_discovery;

        let host = non_empty(&settings.host);
        let token = non_empty(&settings.token);
        let prefix = non_empty(&settings.account_prefix);
        let mut environment_id = None;

        if remote_enabled {
            match host {
                None => errors.push(
                    "TESSERA_HOST environment variable is required when semantic layer or discovery is enabled."
                        .to_string(),
                ),
                Some(h) if h.starts_with("metadata") || h.starts_with("semantic-layer") => {
                    errors.push("TESSERA_HOST must not start with 'metadata' or 'semantic-layer'.".to_string())
                }
                Some(_) => {}
            }
            match non_empty(&settings.prod_environment_id) {
                None => errors.push(
                    "TESSERA_PROD_ENV_ID environment variable is required when semantic layer or discovery is enabled."
                        .to_string(),
                ),
                Some(id) => match id.parse::<i64>() {
                    Ok(id) => environment_id = Some(id),
                    Err(_) => errors.push(format!("TESSERA_PROD_ENV_ID must be an integer, got `{}`.", id)),
                },
            }
            if token.is_none() {
                errors.push(
                    "TESSERA_TOKEN environment variable is required when semantic layer or discovery is enabled."
                        .to_string(),
                );
            }
        }

        let transport = match non_empty(&settings.sl_transport) {
            None => TransportKind::default(),
            Some(raw) => raw.parse::<TransportKind>().unwrap_or_else(|e| {
                errors.push(format!("TESSERA_SL_TRANSPORT: {}", e));
                TransportKind::default()
            }),
        };

        if !settings.disable_cli {
            if settings.project_dir.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
                errors.push("TESSERA_PROJECT_DIR environment variable is required when CLI tools are enabled.".to_string());
            }
            if settings.cli_path.trim().is_empty() {
                errors.push("TESSERA_CLI_PATH environment variable is required when CLI tools are enabled.".to_string());
            }
        }

        if settings.max_response_bytes == 0 {
            errors.push("TESSERA_MAX_RESPONSE_BYTES must be greater than zero.".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        let remote = match (host, token, environment_id) {
            (Some(host), Some(token), Some(environment_id)) if remote_enabled => Some((host, token, environment_id)),
            _ => None,
        };

        let semantic_layer = remote
            .filter(|_| !settings.disable_semantic_layer)
            .map(|(host, token, environment_id)| SemanticLayerConnection {
                base_url: semantic_layer_base_url(host, prefix),
                environment_id,
                token: token.to_string(),
                transport,
                poll: PollConfig::default(),
            });

        let discovery = remote
            .filter(|_| !settings.disable_discovery)
            .map(|(host, token, environment_id)| DiscoveryConfig {
                url: metadata_url(host, prefix),
                token: token.to_string(),
                environment_id,
            });

        let cli = match (settings.disable_cli, settings.project_dir) {
            (false, Some(project_dir)) => Some(CliConfig {
                executable: settings.cli_path.trim().to_string(),
                project_dir,
            }),
            _ => None,
        };

        Ok(Config {
            semantic_layer,
            discovery,
            cli,
            max_response_bytes: settings.max_response_bytes,
            usage_log: settings.usage_log,
            environment_id,
        })
    }
}

fn is_local(host: &str) -> bool {
    host.starts_with("localhost")
}

/// `https://[prefix.]semantic-layer.<host>`, or `http://<host>` for local hosts.
pub fn semantic_layer_base_url(host: &str, prefix: Option<&str>) -> String {
    if is_local(host) {
        return format!("http://{}", host);
    }
    match prefix {
        Some(prefix) => format!("https://{}.semantic-layer.{}", prefix, host),
        None => format!("https://semantic-layer.{}", host),
    }
}

/// Metadata GraphQL endpoint, `https://[prefix.]metadata.<host>/graphql`.
pub fn metadata_url(host: &str, prefix: Option<&str>) -> String {
    if is_local(host) {
        return format!("http://{}/graphql", host);
    }
    match prefix {
        Some(prefix) => format!("https://{}.metadata.{}/graphql", prefix, host),
        None => format!("https://metadata.{}/graphql", host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_settings() -> Settings {
        Settings {
            host: Some("cloud.example.com".to_string()),
            prod_environment_id: Some("42".to_string()),
            token: Some("secret".to_string()),
            disable_cli: true,
            ..Settings::default()
        }
    }

    #[test]
    fn test_resolves_endpoints() {
        let config = Config::from_settings(remote_settings()).unwrap();
        let sl = config.semantic_layer.unwrap();
        assert_eq!(sl.base_url, "https://semantic-layer.cloud.example.com");
        assert_eq!(sl.environment_id, 42);
        assert_eq!(sl.transport, TransportKind::Graphql);
        assert_eq!(config.discovery.unwrap().url, "https://metadata.cloud.example.com/graphql");
        assert!(config.cli.is_none());
        assert_eq!(config.environment_id, Some(42));
    }

    #[test]
    fn test_account_prefix_and_local_hosts() {
        assert_eq!(
            semantic_layer_base_url("cloud.example.com", Some("ab123")),
            "https://ab123.semantic-layer.cloud.example.com"
        );
        assert_eq!(metadata_url("cloud.example.com", Some("ab123")), "https://ab123.metadata.cloud.example.com/graphql");
        assert_eq!(semantic_layer_base_url("localhost:8000", Some("ab123")), "http://localhost:8000");
        assert_eq!(metadata_url("localhost:8000", None), "http://localhost:8000/graphql");
    }

    #[test]
    fn test_collects_every_error() {
        let err = Config::from_settings(Settings::default()).unwrap_err();
        let ConfigError::Invalid(errors) = &err;
        assert_eq!(errors.len(), 4);
        let message = err.to_string();
        assert!(message.starts_with("Errors found in configuration:\n\nTESSERA_HOST"));
        assert!(message.contains("\nTESSERA_PROJECT_DIR"));
    }

    #[test]
    fn test_rejects_prefixed_host_and_bad_values() {
        let settings = Settings {
            host: Some("metadata.cloud.example.com".to_string()),
            prod_environment_id: Some("prod".to_string()),
            sl_transport: Some("grpc".to_string()),
            ..remote_settings()
        };
        let ConfigError::Invalid(errors) = Config::from_settings(settings).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("must not start with"));
        assert!(errors[1].contains("must be an integer"));
        assert!(errors[2].contains("unknown semantic layer transport `grpc`"));
    }

    #[test]
    fn test_only_cli_enabled() {
        let settings = Settings {
            disable_semantic_layer: true,
            disable_discovery: true,
            project_dir: Some(PathBuf::from("/work/project")),
            ..Settings::default()
        };
        let config = Config::from_settings(settings).unwrap();
        assert!(config.semantic_layer.is_none() && config.discovery.is_none());
        let cli = config.cli.unwrap();
        assert_eq!(cli.executable, "dbt");
        assert_eq!(cli.project_dir, PathBuf::from("/work/project"));
    }

    #[test]
    fn test_flight_transport_selected() {
        let settings = Settings {
            sl_transport: Some("Flight".to_string()),
            disable_discovery: true,
            ..remote_settings()
        };
        let config = Config::from_settings(settings).unwrap();
        assert_eq!(config.semantic_layer.unwrap().transport, TransportKind::Flight);
        assert!(config.discovery.is_none());
    }
}
