//! Error types for the semantic layer.

use tessera_graphql::GraphqlError;
use thiserror::Error;

/// Failures talking to the semantic layer backend.
///
/// These never escape [`crate::SemanticLayerFetcher::query_metrics`]; they
/// are normalized into [`crate::QueryResult::Error`] there.
#[derive(Error, Debug)]
pub enum BackendError {
    /// GraphQL transport or API failure
    #[error(transparent)]
    Graphql(#[from] GraphqlError),

    /// The backend accepted the query and reported it as failed
    #[error("{0}")]
    QueryFailed(String),

    /// Opening or using a query session failed
    #[error("{0}")]
    Session(String),

    /// The submit/poll protocol ran out of attempts
    #[error("Query timed out. Please try again or simplify your query.")]
    TimedOut { attempts: u32 },

    /// Result set conversion failed
    #[error("Failed to convert result set: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl BackendError {
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }
}

/// Request errors that abort a query before the backend is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Order by `{0}` not found in metrics or group by")]
    OrderByNotFound(String),
}
