use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use antipoff_shared::{PasswordError, TokenError, ValidationError};
use antipoff_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServerError::NotFound("Record not found".into()),
            StoreError::Conflict(detail) => {
                tracing::debug!(%detail, "unique constraint violated");
                ServerError::Conflict("Record already exists".into())
            }
            StoreError::ForeignKey(detail) => {
                tracing::debug!(%detail, "foreign key constraint violated");
                ServerError::Conflict("Record is referenced by or references another record".into())
            }
            StoreError::Check(detail) => {
                tracing::debug!(%detail, "check constraint violated");
                ServerError::BadRequest("Value rejected by a table constraint".into())
            }
            StoreError::UnknownColumn { column, .. } => {
                ServerError::BadRequest(format!("Unknown column '{column}'"))
            }
            other => ServerError::Storage(other.to_string()),
        }
    }
}

impl From<PasswordError> for ServerError {
    fn from(err: PasswordError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<TokenError> for ServerError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ServerError::Unauthorized("Token expired".into()),
            TokenError::Invalid(_) | TokenError::WrongKind => {
                ServerError::Unauthorized("Invalid token".into())
            }
            TokenError::UnsupportedAlgorithm(_) | TokenError::Encode(_) => {
                ServerError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::Storage(detail) => {
                tracing::error!(%detail, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            ServerError::UpstreamUnavailable(detail) => {
                tracing::error!(%detail, "upstream failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Service unavailable".to_string())
            }
            ServerError::Internal(detail) => {
                tracing::error!(%detail, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
