//! Error taxonomy for the retrieval core.
//!
//! Every fallible operation in `rag` returns [`RagError`]. Callers that only
//! care about the category (e.g. the HTTP layer) should match on
//! [`RagError::kind`] instead of the payload.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("no index found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("engine is not ready: no index has been built or loaded")]
    NotReady,

    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("index storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Payload-free view of [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    EmptyInput,
    DimensionMismatch,
    CorruptIndex,
    NotFound,
    InvalidArgument,
    NotReady,
    Generation,
    Embedding,
    Storage,
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Config(_) => ErrorKind::Config,
            RagError::EmptyInput(_) => ErrorKind::EmptyInput,
            RagError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            RagError::CorruptIndex(_) => ErrorKind::CorruptIndex,
            RagError::NotFound(_) => ErrorKind::NotFound,
            RagError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RagError::NotReady => ErrorKind::NotReady,
            RagError::Generation(_) => ErrorKind::Generation,
            RagError::Embedding(_) => ErrorKind::Embedding,
            RagError::Storage(_) | RagError::Io(_) => ErrorKind::Storage,
        }
    }
}

pub type RagResult<T> = Result<T, RagError>;
