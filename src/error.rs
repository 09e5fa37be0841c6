//! Typed errors carried by the execution context.
//!
//! Every fallible step a handler performs ends up as an [`ApiError`]. The
//! variants keep the underlying backend error as their source so nothing is
//! lost on the way to the response layer, and [`ApiError::kind`] lets callers
//! branch on the broad category without matching on backend types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::jwt::CryptoError;

/// Broad classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection pool or database failure.
    Backend,
    /// Token signing, verification or key handling failure.
    Crypto,
    /// An outbound HTTP call failed or returned a non-success status.
    Upstream,
    NotFound,
    Unauthorized,
    BadRequest,
    Internal,
}

/// The single error type flowing through a request's execution context.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Pool(_) | ApiError::Database(_) => ErrorKind::Backend,
            ApiError::Crypto(_) => ErrorKind::Crypto,
            ApiError::Http(_) => ErrorKind::Upstream,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Unauthorized(_) => ErrorKind::Unauthorized,
            ApiError::BadRequest(_) => ErrorKind::BadRequest,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The HTTP status this error maps to at the response layer.
    pub fn status(&self) -> StatusCode {
        match self {
            // A pool error only happens when no connection could be acquired in time.
            ApiError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Crypto(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Http(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to a client. Server-side failures stay opaque.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::Unauthorized | ErrorKind::BadRequest => {
                self.to_string()
            }
            ErrorKind::Upstream => "Upstream service error".to_string(),
            ErrorKind::Backend if self.status() == StatusCode::SERVICE_UNAVAILABLE => {
                "Service temporarily unavailable".to_string()
            }
            ErrorKind::Backend | ErrorKind::Crypto | ErrorKind::Internal => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Converts an `ApiError` into a JSON error response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}
