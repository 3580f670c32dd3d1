//! Errors for source acquisition.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    /// The URL is unreachable, authentication failed, or the local path does
    /// not exist. Always fatal for the task.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
