//! Session-scoped query transport.
//!
//! Each query opens its own session, runs, and closes the session again
//! whatever the outcome. Result sets arrive as Arrow record batches and are
//! rendered as record-oriented JSON.

use crate::error::BackendError;
use crate::executor::QueryBackend;
use crate::request::QueryRequest;
use arrow::json::writer::JsonArray;
use arrow::json::WriterBuilder;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Factory for query sessions.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn QuerySession>, BackendError>;
}

/// One open session against the backend. Never shared between queries.
///
/// [`SessionQueryBackend`] always calls `close`, including when the query
/// panics or the caller drops the request mid-flight. In those two cases
/// `close` runs on a detached task, so it must not rely on the caller.
#[async_trait]
pub trait QuerySession: Send {
    async fn query(&mut self, request: &QueryRequest) -> Result<Vec<RecordBatch>, BackendError>;

    async fn close(self: Box<Self>) -> Result<(), BackendError>;
}

/// Owns an open session until it is closed; closes it in the background
/// when dropped while still open.
struct OpenSession {
    session: Option<Box<dyn QuerySession>>,
}

impl OpenSession {
    async fn query(&mut self, request: &QueryRequest) -> Result<Vec<RecordBatch>, BackendError> {
        match self.session.as_mut() {
            Some(session) => session.query(request).await,
            None => Err(BackendError::session("session already closed")),
        }
    }

    async fn close(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close query session: {}", e);
            }
        }
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Closing abandoned query session");
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!("Failed to close abandoned query session: {}", e);
                    }
                });
            }
            Err(_) => warn!("Query session dropped outside a runtime; not closed"),
        }
    }
}

/// Backend that runs each query in a fresh session.
pub struct SessionQueryBackend {
    client: Arc<dyn SessionClient>,
}

impl SessionQueryBackend {
    pub fn new(client: Arc<dyn SessionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryBackend for SessionQueryBackend {
    async fn run(&self, request: &QueryRequest) -> Result<String, BackendError> {
        let mut session = OpenSession {
            session: Some(self.client.open_session().await?),
        };
        debug!("Session opened");

        let outcome = session.query(request).await;
        session.close().await;

        let batches = outcome?;
        batches_to_json(&batches)
    }
}

/// Render batches as a JSON array of row objects.
///
/// Keys follow the schema's column order and nulls are written explicitly.
pub fn batches_to_json(batches: &[RecordBatch]) -> Result<String, BackendError> {
    let non_empty: Vec<&RecordBatch> = batches.iter().filter(|b| b.num_rows() > 0).collect();
    if non_empty.is_empty() {
        return Ok("[]".to_string());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    writer.write_batches(&non_empty)?;
    writer.finish()?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| BackendError::session(format!("result set is not valid UTF-8: {}", e)))
}
