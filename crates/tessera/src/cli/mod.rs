//! Command implementations and the flags shared by every command.

pub mod config;
pub mod serve;

use clap::Args;
use std::path::PathBuf;
use tessera_mcp::config::{DEFAULT_CLI_PATH, DEFAULT_MAX_RESPONSE_BYTES};
use tessera_mcp::Settings;

/// Connection and feature settings, each readable from the environment.
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Platform host, without a `metadata.` or `semantic-layer.` prefix
    #[arg(long, env = "TESSERA_HOST", global = true)]
    pub host: Option<String>,

    /// Production environment id
    #[arg(long = "prod-env-id", env = "TESSERA_PROD_ENV_ID", global = true)]
    pub prod_env_id: Option<String>,

    /// API token
    #[arg(long, env = "TESSERA_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Account prefix for multi-cell deployments
    #[arg(long, env = "TESSERA_ACCOUNT_PREFIX", global = true)]
    pub account_prefix: Option<String>,

    /// Local project directory used by the CLI tools
    #[arg(long, env = "TESSERA_PROJECT_DIR", global = true)]
    pub project_dir: Option<PathBuf>,

    /// Executable used by the CLI tools
    #[arg(long, env = "TESSERA_CLI_PATH", default_value = DEFAULT_CLI_PATH, global = true)]
    pub cli_path: String,

    #[arg(long, env = "TESSERA_DISABLE_CLI", global = true)]
    pub disable_cli: bool,

    #[arg(long, env = "TESSERA_DISABLE_SEMANTIC_LAYER", global = true)]
    pub disable_semantic_layer: bool,

    #[arg(long, env = "TESSERA_DISABLE_DISCOVERY", global = true)]
    pub disable_discovery: bool,

    /// Semantic layer query transport: graphql or flight
    #[arg(long, env = "TESSERA_SL_TRANSPORT", global = true)]
    pub sl_transport: Option<String>,

    /// Largest tool output returned before it is replaced by a truncation notice
    #[arg(long, env = "TESSERA_MAX_RESPONSE_BYTES", default_value_t = DEFAULT_MAX_RESPONSE_BYTES, global = true)]
    pub max_response_bytes: usize,

    /// Usage event log (NDJSON); defaults to `$TESSERA_HOME/usage.ndjson`
    #[arg(long, env = "TESSERA_USAGE_LOG", global = true)]
    pub usage_log: Option<PathBuf>,
}

impl SettingsArgs {
    pub fn into_settings(self) -> Settings {
        Settings {
            host: self.host,
            prod_environment_id: self.prod_env_id,
            token: self.token,
            account_prefix: self.account_prefix,
            project_dir: self.project_dir,
            cli_path: self.cli_path,
            disable_cli: self.disable_cli,
            disable_semantic_layer: self.disable_semantic_layer,
            disable_discovery: self.disable_discovery,
            sl_transport: self.sl_transport,
            max_response_bytes: self.max_response_bytes,
            usage_log: Some(
                self.usage_log
                    .unwrap_or_else(|| tessera_logging::tessera_home().join("usage.ndjson")),
            ),
        }
    }
}
