//! Error types for the embedding service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("vector size mismatch: got={got}, want={want}")]
    VectorSizeMismatch { got: usize, want: usize },

    #[error("model did not become ready within {0:?}")]
    WarmUpTimeout(std::time::Duration),
}
