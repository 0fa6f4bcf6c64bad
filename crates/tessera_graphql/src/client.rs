//! reqwest-backed GraphQL client.

use crate::{GraphqlError, GraphqlRequest, GraphqlTransport};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace, warn};

const CLIENT_SOURCE_HEADER: &str = "x-client-source";
const CLIENT_SOURCE: &str = "tessera-mcp";

/// Per-request ceiling for the default HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GraphQL client posting JSON documents to a single endpoint.
pub struct HttpGraphqlClient {
    http: reqwest::Client,
    url: String,
    auth_header: String,
}

impl HttpGraphqlClient {
    /// Create a client for `url` authenticating with a bearer token.
    ///
    /// Every request is bounded by [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn new(url: impl Into<String>, token: &str) -> Self {
        Self {
            http: default_http_client(),
            url: url.into(),
            auth_header: format!("Bearer {}", token),
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to an HTTP client without timeout: {}", e);
            reqwest::Client::new()
        })
}

#[async_trait]
impl GraphqlTransport for HttpGraphqlClient {
    async fn send(&self, request: &GraphqlRequest) -> Result<Value, GraphqlError> {
        debug!("POST {}", self.url);
        let variables = Value::Object(request.variables.clone());
        trace!("GraphQL variables: {}", variables);

        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(CONTENT_TYPE, "application/json")
            .header(CLIENT_SOURCE_HEADER, CLIENT_SOURCE)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| GraphqlError::malformed(format!("invalid JSON body: {}", e)));
        }

        // GraphQL servers often pair a 4xx with a regular error document;
        // hand that back so `execute` reports the API's own messages.
        match serde_json::from_str::<Value>(&body) {
            Ok(document) if document.get("errors").is_some() => Ok(document),
            _ => Err(GraphqlError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}
