use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::rag::{ErrorKind, RagError};

pub const PREPARING_MESSAGE: &str =
    "The knowledge base is still being prepared. Please try again in a moment.";
pub const RETRY_MESSAGE: &str =
    "The language model could not be reached. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err.kind() {
            ErrorKind::NotReady | ErrorKind::NotFound => ApiError::ServiceUnavailable,
            ErrorKind::InvalidArgument | ErrorKind::EmptyInput | ErrorKind::Config => {
                ApiError::BadRequest(err.to_string())
            }
            ErrorKind::Generation | ErrorKind::Embedding => {
                tracing::warn!("Upstream call failed: {:#}", anyhow::Error::from(err));
                ApiError::Upstream(RETRY_MESSAGE.to_string())
            }
            ErrorKind::DimensionMismatch | ErrorKind::CorruptIndex | ErrorKind::Storage => {
                tracing::error!("Index error: {}", err);
                ApiError::internal(err)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, PREPARING_MESSAGE.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
