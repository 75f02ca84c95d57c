//! Account Error Types
//!
//! Centralized error handling for the account workflow. Lower layers
//! (store, tokens, hashing) have their own error types; they are folded into
//! [`AuthError`] here, and `AuthError` is the only thing that reaches a
//! client.

use crate::models::{ApiResponse, UniqueField};
use crate::store::StoreError;
use crate::token::TokenError;
use crate::validation::ValidationError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Account workflow errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid input")]
    InvalidInput,

    #[error("{} already exists", .0.label())]
    AlreadyExists(UniqueField),

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error")]
    Internal,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::InvalidInput => StatusCode::BAD_REQUEST,
            AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Database(_) | AuthError::Config(_) | AuthError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show a client
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Config(_) | AuthError::Internal => {
                AuthError::Internal.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiResponse::error(self.public_message()))).into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AuthError::Internal
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(e) => {
                tracing::error!("JWT encoding error: {:?}", e);
                AuthError::Internal
            }
            other => {
                tracing::debug!("JWT rejected: {}", other);
                AuthError::InvalidToken
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => AuthError::AlreadyExists(field),
            StoreError::NotFound => AuthError::UserNotFound,
            StoreError::Rejected(reason) => {
                tracing::error!("Account store rejected update: {}", reason);
                AuthError::Internal
            }
            StoreError::Database(e) => AuthError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_messages() {
        assert_eq!(
            AuthError::AlreadyExists(UniqueField::Login).to_string(),
            "Login already exists"
        );
        assert_eq!(
            AuthError::AlreadyExists(UniqueField::DisplayName).to_string(),
            "Display name already exists"
        );
        assert_eq!(
            AuthError::from(ValidationError::Email).to_string(),
            "Invalid email format"
        );
    }

    #[test]
    fn test_token_errors_collapse() {
        for err in [
            TokenError::InvalidSignature,
            TokenError::Expired,
            TokenError::Malformed,
        ] {
            assert!(matches!(AuthError::from(err), AuthError::InvalidToken));
        }
    }

    #[test]
    fn test_store_errors_map() {
        assert!(matches!(
            AuthError::from(StoreError::Conflict(UniqueField::Email)),
            AuthError::AlreadyExists(UniqueField::Email)
        ));
        assert!(matches!(
            AuthError::from(StoreError::NotFound),
            AuthError::UserNotFound
        ));
        assert!(matches!(
            AuthError::from(StoreError::Rejected("password")),
            AuthError::Internal
        ));
    }

    #[tokio::test]
    async fn test_internal_detail_hidden() {
        let response = AuthError::Database("disk I/O error at /var/lib".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Server error" })
        );
    }

    #[tokio::test]
    async fn test_conflict_response() {
        let response = AuthError::AlreadyExists(UniqueField::Login).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Login already exists");
    }
}
