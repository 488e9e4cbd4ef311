//! Classified operation failures and their HTTP mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use roster_accounts::StoreError;
use roster_auth::AuthError;
use thiserror::Error;

/// The single failure an account operation reports.
///
/// `Internal` carries its cause for logs and tests, but callers only ever
/// see a fixed message.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error in {operation}: {cause}")]
    Internal {
        operation: &'static str,
        cause: String,
    },
}

impl ServiceError {
    /// Builds an `Internal` failure and logs its cause.
    pub fn internal(operation: &'static str, cause: impl std::fmt::Display) -> Self {
        let cause = cause.to_string();
        tracing::error!(operation, %cause, "account operation failed");
        Self::Internal { operation, cause }
    }

    pub(crate) fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(format!("account not found: {what}")),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::internal(operation, other),
        }
    }

    pub(crate) fn from_auth(operation: &'static str, err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::MalformedToken(_) => {
                Self::Malformed(err.to_string())
            }
            AuthError::InvalidToken(_) => Self::Unauthenticated(err.to_string()),
            AuthError::Issue(_) => Self::internal(operation, err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidCredential(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Malformed(msg)
            | Self::Unauthenticated(msg)
            | Self::InvalidCredential(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg,
            Self::Internal { .. } => "internal server error".to_string(),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
