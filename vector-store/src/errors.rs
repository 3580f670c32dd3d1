//! Error types for the vector store facade.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("config error: {0}")]
    Config(String),

    #[error("qdrant error: {0}")]
    Qdrant(String),

    #[error("payload error: {0}")]
    Payload(String),

    #[error("vector size mismatch: got={got}, want={want}")]
    VectorSizeMismatch { got: usize, want: usize },
}
