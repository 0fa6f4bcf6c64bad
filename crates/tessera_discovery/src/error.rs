use tessera_graphql::GraphqlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Graphql(#[from] GraphqlError),

    #[error("Malformed discovery response: {0}")]
    Malformed(String),
}
