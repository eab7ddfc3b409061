//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown username or wrong password; the two are never distinguished
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No usable bearer token on a protected request
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Token failed signature, algorithm or expiry checks
    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Store or key infrastructure failure
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Stored digest could not be parsed
    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status, stable machine-readable code and client-facing message
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            AuthError::Unauthenticated | AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required".to_string(),
            ),
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Insufficient permissions".to_string(),
            ),
            AuthError::Malformed(msg) => (StatusCode::BAD_REQUEST, "MALFORMED", msg.clone()),
            AuthError::AlreadyExists(msg) => {
                (StatusCode::BAD_REQUEST, "ALREADY_EXISTS", msg.clone())
            }
            AuthError::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "Service temporarily unavailable".to_string(),
            ),
            AuthError::MalformedHash | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Internal error".to_string(),
            ),
        }
    }
}

impl From<credgate_db::DbError> for AuthError {
    fn from(err: credgate_db::DbError) -> Self {
        match err {
            credgate_db::DbError::Duplicate(msg) => AuthError::AlreadyExists(msg),
            other => AuthError::Unavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = axum::Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
