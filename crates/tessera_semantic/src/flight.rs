//! Arrow Flight SQL session client.

use crate::error::BackendError;
use crate::request::QueryRequest;
use crate::session::{QuerySession, SessionClient};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow_flight::sql::client::FlightSqlServiceClient;
use async_trait::async_trait;
use futures::TryStreamExt;
use regex::Regex;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

/// Opens a fresh gRPC channel per session.
pub struct FlightSqlSessionClient {
    url: String,
    environment_id: i64,
    token: String,
}

impl FlightSqlSessionClient {
    /// `url` is the full endpoint, e.g. `https://semantic-layer.example.com:443`.
    pub fn new(url: impl Into<String>, environment_id: i64, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            environment_id,
            token: token.into(),
        }
    }

    async fn connect(&self) -> Result<Channel, BackendError> {
        let mut endpoint = Endpoint::from_shared(self.url.clone())
            .map_err(|e| BackendError::session(format!("Invalid endpoint {}: {}", self.url, e)))?;
        if self.url.starts_with("https://") {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| BackendError::session(format!("TLS setup failed: {}", e)))?;
        }
        endpoint
            .connect()
            .await
            .map_err(|e| BackendError::session(format!("Failed to connect to {}: {}", self.url, e)))
    }
}

#[async_trait]
impl SessionClient for FlightSqlSessionClient {
    async fn open_session(&self) -> Result<Box<dyn QuerySession>, BackendError> {
        debug!("Opening Flight SQL session to {}", self.url);
        let channel = self.connect().await?;
        let mut client = FlightSqlServiceClient::new(channel);
        client.set_header("environmentid", self.environment_id.to_string());
        client.set_token(self.token.clone());
        Ok(Box::new(FlightSqlSession { client }))
    }
}

struct FlightSqlSession {
    client: FlightSqlServiceClient<Channel>,
}

#[async_trait]
impl QuerySession for FlightSqlSession {
    async fn query(&mut self, request: &QueryRequest) -> Result<Vec<RecordBatch>, BackendError> {
        let sql = request.to_semantic_sql();
        debug!("Flight SQL: {}", sql);

        let info = self.client.execute(sql, None).await.map_err(query_failure)?;

        let mut batches = Vec::new();
        for endpoint in info.endpoint {
            let Some(ticket) = endpoint.ticket else {
                continue;
            };
            let stream = self.client.do_get(ticket).await.map_err(query_failure)?;
            let mut part: Vec<RecordBatch> = stream
                .try_collect()
                .await
                .map_err(|e| BackendError::query_failed(e.to_string()))?;
            batches.append(&mut part);
        }
        Ok(batches)
    }

    async fn close(self: Box<Self>) -> Result<(), BackendError> {
        // The channel is torn down with the client.
        drop(self.client);
        Ok(())
    }
}

/// Flight SQL client errors embed the debug form of the gRPC status; keep
/// only its message.
fn query_failure(err: ArrowError) -> BackendError {
    let text = match &err {
        ArrowError::IpcError(msg) => status_message(msg).unwrap_or_else(|| msg.clone()),
        other => other.to_string(),
    };
    BackendError::query_failed(text)
}

fn status_message(debug_status: &str) -> Option<String> {
    let re = Regex::new(r#"message: "((?:[^"\\]|\\.)*)""#).ok()?;
    let raw = re.captures(debug_status)?.get(1)?.as_str();
    Some(raw.replace("\\\"", "\"").replace("\\\\", "\\"))
}
