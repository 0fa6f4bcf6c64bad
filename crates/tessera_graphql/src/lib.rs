//! GraphQL-over-HTTP transport.
//!
//! Both the semantic layer (metadata, query submission, status polling) and
//! the discovery API speak GraphQL. Callers depend on the [`GraphqlTransport`]
//! trait so that tests can script responses; production code uses
//! [`HttpGraphqlClient`].

mod client;
mod error;

pub use client::{HttpGraphqlClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::GraphqlError;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// A GraphQL operation plus its variables.
///
/// User-supplied values only ever travel in `variables`; the query text is
/// always a static document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: Map<String, Value>,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    /// Set a variable, replacing any previous value under the same name.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Set a variable only when a value is present.
    pub fn optional_variable(self, name: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.variable(name, value),
            None => self,
        }
    }
}

/// Transport capable of executing a GraphQL request.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// Send the request and return the raw response document.
    async fn send(&self, request: &GraphqlRequest) -> Result<Value, GraphqlError>;

    /// Send the request and fail if the response carries GraphQL errors.
    async fn execute(&self, request: &GraphqlRequest) -> Result<Value, GraphqlError> {
        let response = self.send(request).await?;
        raise_for_errors(&response)?;
        Ok(response)
    }
}

/// Turn a populated `errors` member into a [`GraphqlError`].
pub fn raise_for_errors(response: &Value) -> Result<(), GraphqlError> {
    let errors = match response.get("errors") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Array(errors)) if errors.is_empty() => return Ok(()),
        Some(Value::Bool(false)) => return Ok(()),
        Some(errors) => errors,
    };

    let messages: Vec<String> = errors
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(Value::as_object)
                .map(|error| {
                    error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error")
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        Err(GraphqlError::UnknownApi)
    } else {
        Err(GraphqlError::Api(messages))
    }
}

/// Walk `data.<path...>` of a response document.
pub fn data_at<'a>(response: &'a Value, path: &[&str]) -> Result<&'a Value, GraphqlError> {
    let mut current = response
        .get("data")
        .ok_or_else(|| GraphqlError::MalformedResponse("missing `data`".to_string()))?;
    for (depth, key) in path.iter().enumerate() {
        current = current.get(key).filter(|v| !v.is_null()).ok_or_else(|| {
            GraphqlError::MalformedResponse(format!("missing `data.{}`", path[..=depth].join(".")))
        })?;
    }
    Ok(current)
}
