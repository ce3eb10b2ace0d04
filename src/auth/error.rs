use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::password::CredentialError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Errors surfaced by the auth subsystem. Client-facing bodies never
/// include the password, derived key, or salt.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing required input (empty username/password).
    #[error("{0}")]
    Validation(String),

    /// Username already registered (case-insensitive).
    #[error("username already exists")]
    UsernameTaken,

    /// Unknown user or wrong password. Deliberately a single variant so
    /// the response never reveals which one it was.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Request carries no resolvable session.
    #[error("unauthorized")]
    Unauthorized,

    /// Stored hash failed to parse. A data-integrity problem, not a bad
    /// login; clients see the uniform 401.
    #[error("invalid credentials")]
    MalformedCredential,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::UsernameTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::Unauthorized
            | AuthError::MalformedCredential => StatusCode::UNAUTHORIZED,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            AuthError::MalformedCredential => {
                tracing::error!("stored credential is malformed; operator attention required");
            }
            AuthError::Database(e) => {
                tracing::error!(error = %e, "auth database error");
            }
            AuthError::Internal(e) => {
                tracing::error!(error = %e, "auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("invalid login attempt");
            }
            _ => {
                tracing::debug!(error = %self, "auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        // 5xx details stay in the logs.
        let message = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Malformed => AuthError::MalformedCredential,
            CredentialError::Kdf(msg) => AuthError::Internal(anyhow::anyhow!(msg)),
        }
    }
}
