//! MCP Server Implementation
//!
//! JSON-RPC 2.0 over stdio. Requests are read one line at a time; every
//! `tools/call` runs on its own task so a slow query does not hold up other
//! calls. Responses from all tasks go through one writer task, which keeps
//! each line intact on the output stream.
//!
//! # Example
//!
//! ```ignore
//! let server = McpServer::new(McpServerConfig::default(), registry, usage);
//! server.run_stdio().await?;
//! ```

use crate::protocol::{
    methods, parse_request, write_message, ErrorCode, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, MessageReader, RequestId, ServerCapabilities, ServerInfo, ToolsCallParams,
    ToolsCapability, ToolsListResult, MCP_PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use crate::types::{Tool, ToolResult};
use crate::usage::{ToolCalledEvent, UsageTracker};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// MCP Server configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name (reported in initialize)
    pub server_name: String,

    /// Server version (reported in initialize)
    pub server_version: String,

    /// Tool output above this size is replaced by a truncation notice
    pub max_response_bytes: usize,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_name: "tessera".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            max_response_bytes: crate::config::DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

pub struct McpServer {
    config: McpServerConfig,
    tools: Arc<ToolRegistry>,
    usage: Arc<UsageTracker>,
    initialized: bool,
}

impl McpServer {
    pub fn new(config: McpServerConfig, tools: ToolRegistry, usage: UsageTracker) -> Self {
        Self {
            config,
            tools: Arc::new(tools),
            usage: Arc::new(usage),
            initialized: false,
        }
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn run_stdio(self) -> Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches end of input, then wait for in-flight
    /// tool calls and flush their responses.
    pub async fn serve<R, W>(mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("MCP server starting with {} tools", self.tools.len());

        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                write_message(&mut writer, &response).await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut reader = MessageReader::new(reader);
        let mut calls = JoinSet::new();

        while let Some(line) = reader.next_line().await.context("Failed to read request")? {
            while calls.try_join_next().is_some() {}

            let request = match parse_request(&line) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Rejected message: {}", e.message);
                    send(&tx, JsonRpcResponse::error(RequestId::Null, e));
                    continue;
                }
            };

            if request.method == methods::TOOLS_CALL && self.initialized {
                if let Some(id) = request.id.clone() {
                    match self.prepare_call(request) {
                        Ok((tool, arguments)) => {
                            let tx = tx.clone();
                            let usage = self.usage.clone();
                            let max_bytes = self.config.max_response_bytes;
                            calls.spawn(async move {
                                let result = run_tool(tool, arguments, &usage, max_bytes).await;
                                send(&tx, to_response(id, &result));
                            });
                        }
                        Err(e) => send(&tx, JsonRpcResponse::error(id, e)),
                    }
                    continue;
                }
            }

            if let Some(response) = self.handle_request(request) {
                send(&tx, response);
            }
        }

        while calls.join_next().await.is_some() {}
        drop(tx);
        writer_task
            .await
            .context("Writer task panicked")?
            .context("Failed to write response")?;

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle every method except a runnable `tools/call`.
    ///
    /// Returns `None` for notifications.
    fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            if request.method != methods::INITIALIZED {
                debug!("Ignoring notification {}", request.method);
            }
            return None;
        };

        let response = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(id, request.params),
            methods::INITIALIZED | methods::PING => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => self.handle_tools_list(id),
            methods::TOOLS_CALL => {
                JsonRpcResponse::error(id, JsonRpcError::new(ErrorCode::NotInitialized, "Server not initialized"))
            }
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    fn handle_initialize(&mut self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match params.map(serde_json::from_value::<InitializeParams>).transpose() {
            Ok(params) => params.unwrap_or_default(),
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(ErrorCode::InvalidParams, format!("Invalid initialize params: {}", e)),
                );
            }
        };

        match &params.client_info {
            Some(client) => info!(
                "Initialize from {} v{} (protocol {})",
                client.name, client.version, params.protocol_version
            ),
            None => info!("Initialize (protocol {})", params.protocol_version),
        }
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
        };
        to_response(id, &result)
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.tools.list_tools(),
        };
        to_response(id, &result)
    }

    fn prepare_call(&self, request: JsonRpcRequest) -> Result<(Arc<dyn Tool>, Value), JsonRpcError> {
        let params: ToolsCallParams = request
            .params
            .map(serde_json::from_value::<ToolsCallParams>)
            .transpose()
            .map_err(|e| JsonRpcError::new(ErrorCode::InvalidParams, format!("Invalid tool call params: {}", e)))?
            .ok_or_else(|| JsonRpcError::new(ErrorCode::InvalidParams, "Missing tool call params"))?;

        let tool = self
            .tools
            .get_tool(&params.name)
            .ok_or_else(|| JsonRpcError::new(ErrorCode::InvalidParams, format!("Unknown tool: {}", params.name)))?;
        Ok((tool, params.arguments))
    }
}

/// Execute one tool call, apply the output budget and record usage.
async fn run_tool(tool: Arc<dyn Tool>, arguments: Value, usage: &UsageTracker, max_bytes: usize) -> ToolResult {
    let name = tool.name().to_string();
    info!("Tool call: {}", name);
    let started = Instant::now();

    let (result, failure) = match tool.execute(arguments.clone()).await {
        Ok(result) => {
            let failure = result.is_error.then(|| result.joined_text());
            (enforce_budget(result, max_bytes), failure)
        }
        Err(e) => {
            error!("Tool {} failed (code {}): {}", name, e.error_code(), e);
            (ToolResult::error(format!("Error: {}", e)), Some(e.to_string()))
        }
    };

    let elapsed = started.elapsed();
    debug!("Tool {} finished in {:?}", name, elapsed);
    usage.record(ToolCalledEvent::new(&name, &arguments, elapsed, failure));
    result
}

/// Replace oversized output with a notice the client can act on.
pub fn enforce_budget(result: ToolResult, max_bytes: usize) -> ToolResult {
    let original_bytes: usize = result.content.iter().map(|c| c.as_text().len()).sum();
    if original_bytes <= max_bytes {
        return result;
    }
    warn!("Response truncated from {} to {} bytes", original_bytes, max_bytes);
    let notice = json!({
        "truncated": true,
        "max_bytes": max_bytes,
        "original_bytes": original_bytes,
        "message": "Response exceeded size limit. Use pagination or filters to reduce output.",
        "partial_data": null
    });
    ToolResult::error(notice.to_string())
}

fn to_response<T: serde::Serialize>(id: RequestId, value: &T) -> JsonRpcResponse {
    match serde_json::to_value(value) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            JsonRpcResponse::error(id, JsonRpcError::new(ErrorCode::InternalError, "Failed to serialize response"))
        }
    }
}

fn send(tx: &mpsc::UnboundedSender<JsonRpcResponse>, response: JsonRpcResponse) {
    if tx.send(response).is_err() {
        warn!("Response dropped, output closed");
    }
}
