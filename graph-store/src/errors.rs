//! Error types for the graph store facade.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphStoreError {
    #[error("config error: {0}")]
    Config(String),

    #[error("neo4j error: {0}")]
    Neo4j(String),

    #[error("row decode error: {0}")]
    Decode(String),
}

impl From<neo4rs::Error> for GraphStoreError {
    fn from(e: neo4rs::Error) -> Self {
        GraphStoreError::Neo4j(e.to_string())
    }
}
