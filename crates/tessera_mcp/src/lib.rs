//! MCP (Model Context Protocol) server for tessera
//!
//! Exposes semantic layer queries, model discovery and the local project CLI
//! as MCP tools over newline-delimited JSON-RPC on stdio.
//!
//! ```text
//!   MCP client ──stdio──▶ server ──▶ ToolRegistry ──▶ semantic_layer tools ──▶ tessera_semantic
//!                           │                     ├─▶ discovery tools      ──▶ tessera_discovery
//!                           ▼                     └─▶ cli tools            ──▶ cli_runner
//!                      usage log
//! ```

pub mod cli_runner;
pub mod config;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod types;
pub mod usage;

pub use config::{Config, ConfigError, Settings};
pub use protocol::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{McpServer, McpServerConfig};
pub use tools::{build_registry, ToolRegistry};
pub use types::{Tool, ToolError, ToolResult};
pub use usage::UsageTracker;
