//! Error taxonomy for ingestion.
//!
//! `StageErrorKind` is the operator-facing classification recorded on the
//! status bus; `IngestError` is what the service API returns at admission
//! time.

use thiserror::Error;

/// Classification of anything that goes wrong inside a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageErrorKind {
    SourceUnavailable,
    ParserError,
    EmbeddingBatchError,
    VectorStoreWriteError,
    GraphStoreWriteError,
    DimensionMismatch,
    ValidationMismatch,
    Cancelled,
}

impl StageErrorKind {
    pub fn as_str(&self) -> &'static str {
        use StageErrorKind::*;
        match self {
            SourceUnavailable => "source_unavailable",
            ParserError => "parser_error",
            EmbeddingBatchError => "embedding_batch_error",
            VectorStoreWriteError => "vector_store_write_error",
            GraphStoreWriteError => "graph_store_write_error",
            DimensionMismatch => "dimension_mismatch",
            ValidationMismatch => "validation_mismatch",
            Cancelled => "cancelled",
        }
    }
}

/// A stage-fatal failure carried up to the orchestrator.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub kind: StageErrorKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(StageErrorKind::Cancelled, "cancelled")
    }
}

/// Admission-time and control-plane errors.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Startup or request configuration is unusable; no task is admitted.
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("repository '{0}' already has an ingest in flight")]
    AlreadyRunning(String),

    #[error("store error: {0}")]
    Store(String),
}
