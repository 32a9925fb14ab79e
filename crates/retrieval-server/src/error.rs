//! Maps every engine/store/vector-index error kind to the `{success,
//! error, message}` envelope and the HTTP status it should carry.

use actix_web::{HttpResponse, ResponseError};
use retrieval_core::EngineError;
use retrieval_core::error::{StoreError, VectorIndexError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    DimensionMismatch(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("too many in-flight requests")]
    Overloaded,

    #[error("request exceeded its deadline")]
    DeadlineExceeded,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "InvalidRequest",
            ApiError::DimensionMismatch(_) => "DimensionMismatch",
            ApiError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            ApiError::Overloaded => "Overloaded",
            ApiError::DeadlineExceeded => "DeadlineExceeded",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Internal(_) => "Internal",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::InvalidRequest(_) | ApiError::DimensionMismatch(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Overloaded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, ApiError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.kind(),
            message: self.to_string(),
        })
    }
}

/// Translates an `EngineError` to the HTTP-facing kind. Store and
/// vector-index failures surfaced through the engine are upstream
/// failures from the HTTP surface's point of view, not internal bugs.
impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::DeadlineExceeded => ApiError::DeadlineExceeded,
            EngineError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            EngineError::Overloaded => ApiError::Overloaded,
            EngineError::UpstreamUnavailable(msg) => ApiError::UpstreamUnavailable(msg),
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
            EngineError::Internal(msg) => ApiError::Internal(msg),
            EngineError::Store(store_err) => match store_err {
                StoreError::Unavailable(msg) => ApiError::UpstreamUnavailable(msg),
                StoreError::DocumentNotFound(id) => ApiError::NotFound(format!("document {id} not found")),
                StoreError::ContentItemNotFound(id) => ApiError::NotFound(format!("content item {id} not found")),
                StoreError::DuplicateContentHash(hash) => {
                    ApiError::Internal(format!("unexpected duplicate content hash: {hash}"))
                }
                StoreError::Corrupt(msg) => ApiError::Internal(msg),
            },
            EngineError::VectorIndex(vec_err) => match vec_err {
                VectorIndexError::Unavailable(msg) => ApiError::UpstreamUnavailable(msg),
                VectorIndexError::CollectionMissing(msg) => ApiError::UpstreamUnavailable(msg),
                VectorIndexError::DimensionMismatch { expected, got } => {
                    ApiError::DimensionMismatch(format!("expected dimension {expected}, got {got}"))
                }
                VectorIndexError::MalformedResponse(msg) => ApiError::UpstreamUnavailable(msg),
            },
        }
    }
}
