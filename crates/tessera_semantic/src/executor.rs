//! Backend execution seam.

use crate::error::BackendError;
use crate::normalize::NoiseTable;
use crate::request::QueryRequest;
use async_trait::async_trait;

/// Runs a resolved query and returns the serialized rows.
///
/// Implemented by [`crate::PollingQueryBackend`] and
/// [`crate::SessionQueryBackend`].
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn run(&self, request: &QueryRequest) -> Result<String, BackendError>;
}

/// Human-readable text for a backend failure.
///
/// Backend-reported failures get the full wrapper and noise treatment. Any
/// other error keeps its display form with only known noise removed.
pub fn describe_backend_error(err: &BackendError, noise: &NoiseTable) -> String {
    match err {
        BackendError::QueryFailed(msg) | BackendError::Session(msg) => noise.clean_query_failure(msg),
        BackendError::TimedOut { .. } => err.to_string(),
        other => {
            let text = other.to_string();
            let cleaned = noise.clean(&text);
            if cleaned.is_empty() {
                text
            } else {
                cleaned
            }
        }
    }
}
