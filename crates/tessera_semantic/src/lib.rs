//! Semantic layer query engine.
//!
//! Turns a metric query (metrics, group-by, order-by, filter, limit) into a
//! validated backend query and returns rows or a clean error message.
//!
//! - [`similarity`]: did-you-mean suggestions
//! - [`validate`]: metric and dimension name checks
//! - [`metadata`]: per-fetcher metadata cache
//! - [`poll`] / [`session`]: the two backend transports
//! - [`normalize`]: backend error cleanup
//! - [`SemanticLayerFetcher`]: ties them together for the tool layer

pub mod connection;
pub mod error;
pub mod executor;
pub mod fetcher;
#[cfg(feature = "flight")]
pub mod flight;
pub mod metadata;
pub mod normalize;
pub mod poll;
pub mod request;
pub mod session;
pub mod similarity;
pub mod types;
pub mod validate;

pub use connection::{SemanticLayerConnection, TransportKind};
pub use error::{BackendError, QueryError};
pub use executor::QueryBackend;
pub use fetcher::{QueryParams, SemanticLayerFetcher};
pub use metadata::MetadataCache;
pub use normalize::NoiseTable;
pub use poll::{PollConfig, PollPhase, PollingQueryBackend};
pub use request::{OrderBySpec, QueryRequest};
pub use session::{QuerySession, SessionClient, SessionQueryBackend};
pub use types::{
    Dimension, DimensionType, Entity, EntityType, Granularity, GroupByParam, GroupByType, Metric, MetricType,
    OrderByParam, QueryResult,
};
