//! Tool trait and result types shared by every tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors a tool can return instead of a result.
///
/// The server reports these to the client as a tool result flagged
/// `isError`, not as a JSON-RPC error.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// JSON-RPC error code for this error category
    pub fn error_code(&self) -> i32 {
        match self {
            ToolError::InvalidParams(_) => -32602,
            ToolError::ExecutionFailed(_) => -32002,
            ToolError::Internal(_) => -32603,
            ToolError::Serialization(_) => -32700,
            ToolError::Io(_) => -32603,
        }
    }
}

/// JSON Schema describing a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolInputSchema {
    /// A tool without arguments
    pub fn empty() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(Value::Object(Default::default())),
            required: None,
        }
    }

    pub fn with_properties(properties: Value, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required.iter().map(|r| r.to_string()).collect())
            },
        }
    }
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        ToolContent::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            ToolContent::Text { text } => text,
        }
    }
}

/// What a tool call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,

    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: false,
        }
    }

    /// Pretty-printed JSON of any serializable value
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        Ok(Self::text(serde_json::to_string_pretty(value)?))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            is_error: true,
        }
    }

    /// Concatenated text of all content blocks
    pub fn joined_text(&self) -> String {
        self.content.iter().map(ToolContent::as_text).collect::<Vec<_>>().join("\n")
    }
}

/// A callable MCP tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> ToolInputSchema;

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError>;
}

/// Deserialize tool arguments, treating `null` as an empty object.
pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { Value::Object(Default::default()) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidParams(e.to_string()))
}
