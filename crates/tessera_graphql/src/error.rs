//! Error types for the GraphQL transport.

use thiserror::Error;

/// GraphQL transport and API errors.
#[derive(Error, Debug)]
pub enum GraphqlError {
    /// Network or protocol failure in the HTTP client
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without a GraphQL error document
    #[error("GraphQL endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response carried one or more GraphQL errors
    #[error("Errors calling API: {}", .0.join(", "))]
    Api(Vec<String>),

    /// The response carried an `errors` member with no usable message
    #[error("Unknown error calling API. Check your configuration or contact support if this persists.")]
    UnknownApi,

    /// The response did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl GraphqlError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
