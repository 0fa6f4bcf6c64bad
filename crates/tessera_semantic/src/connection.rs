//! Wiring a fetcher to a concrete backend.

use crate::error::BackendError;
use crate::executor::QueryBackend;
use crate::fetcher::SemanticLayerFetcher;
use crate::poll::{PollConfig, PollingQueryBackend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tessera_graphql::{GraphqlTransport, HttpGraphqlClient};

/// Which query transport to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// GraphQL `createQuery` then status polling
    #[default]
    Graphql,
    /// Arrow Flight SQL session per query
    Flight,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graphql" => Ok(TransportKind::Graphql),
            "flight" => Ok(TransportKind::Flight),
            other => Err(format!("unknown semantic layer transport `{}` (expected graphql or flight)", other)),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Graphql => f.write_str("graphql"),
            TransportKind::Flight => f.write_str("flight"),
        }
    }
}

/// Resolved connection settings for one semantic layer environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticLayerConnection {
    /// Scheme and host, e.g. `https://semantic-layer.example.com`
    pub base_url: String,
    pub environment_id: i64,
    pub token: String,
    pub transport: TransportKind,
    pub poll: PollConfig,
}

impl SemanticLayerConnection {
    pub fn graphql_url(&self) -> String {
        format!("{}/api/graphql", self.base_url.trim_end_matches('/'))
    }

    /// gRPC endpoint; HTTPS hosts without a port get `:443`.
    pub fn flight_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match base.strip_prefix("https://") {
            Some(authority) if !authority.contains(':') => format!("{}:443", base),
            _ => base.to_string(),
        }
    }

    /// Build a fetcher with its own metadata cache and backend.
    pub fn fetcher(&self) -> Result<SemanticLayerFetcher, BackendError> {
        let graphql: Arc<dyn GraphqlTransport> = Arc::new(HttpGraphqlClient::new(self.graphql_url(), &self.token));
        let backend = self.backend(graphql.clone())?;
        Ok(SemanticLayerFetcher::new(graphql, self.environment_id, backend))
    }

    fn backend(&self, graphql: Arc<dyn GraphqlTransport>) -> Result<Arc<dyn QueryBackend>, BackendError> {
        match self.transport {
            TransportKind::Graphql => Ok(Arc::new(
                PollingQueryBackend::new(graphql, self.environment_id).with_poll_config(self.poll),
            )),
            TransportKind::Flight => self.flight_backend(),
        }
    }

    #[cfg(feature = "flight")]
    fn flight_backend(&self) -> Result<Arc<dyn QueryBackend>, BackendError> {
        let client = crate::flight::FlightSqlSessionClient::new(self.flight_url(), self.environment_id, self.token.clone());
        Ok(Arc::new(crate::session::SessionQueryBackend::new(Arc::new(client))))
    }

    #[cfg(not(feature = "flight"))]
    fn flight_backend(&self) -> Result<Arc<dyn QueryBackend>, BackendError> {
        Err(BackendError::session("this build does not include the Flight SQL transport"))
    }
}
