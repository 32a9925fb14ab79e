//! Per-module error kinds, composed at the HTTP boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("stored row failed to decode: {0}")]
    Corrupt(String),

    #[error("no document with id {0}")]
    DocumentNotFound(uuid::Uuid),

    #[error("no content item with embedding id {0}")]
    ContentItemNotFound(String),

    #[error("content hash already exists: {0}")]
    DuplicateContentHash(String),
}

#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("collection not found: {0}")]
    CollectionMissing(String),

    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector index returned malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding worker unreachable: {0}")]
    Unreachable(String),

    #[error("embedding worker timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("embedding worker returned malformed response: {0}")]
    MalformedResponse(String),
}

/// Outcome of an embedding attempt. Embedding-worker trouble degrades to
/// a zero vector rather than failing the request, so this is a
/// first-class success-shaped return, not a swallowed error.
#[derive(Debug, Clone)]
pub enum EmbeddingOutcome {
    Ok(Vec<f32>),
    Degraded { dimension: usize, reason: String },
}

impl EmbeddingOutcome {
    pub fn into_vector(self) -> Vec<f32> {
        match self {
            EmbeddingOutcome::Ok(v) => v,
            EmbeddingOutcome::Degraded { dimension, .. } => vec![0.0; dimension],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, EmbeddingOutcome::Degraded { .. })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("request exceeded its deadline")]
    DeadlineExceeded,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    VectorIndex(#[from] VectorIndexError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("too many in-flight requests")]
    Overloaded,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidRequest(msg.into())
    }
}
