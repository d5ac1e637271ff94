//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use helpdesk_shared::HelpdeskError;
use serde_json::json;

use crate::auth::{CodecError, JwtError, RevocationError};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authorization header missing")]
    MissingAuthorization,
    #[error("Authorization header must be 'Bearer <token>'")]
    MalformedAuthorization,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token has been revoked")]
    TokenRevoked,
    #[error("Refresh token not found")]
    MissingRefreshCookie,

    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", self.to_string()),
            ApiError::MissingAuthorization => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::MalformedAuthorization => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string()),
            ApiError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", self.to_string()),
            ApiError::TokenRevoked => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED", self.to_string()),
            ApiError::MissingRefreshCookie => (StatusCode::BAD_REQUEST, "MISSING_REFRESH_TOKEN", self.to_string()),

            // Validation
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            // Internal
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
            ApiError::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::TokenExpired,
            JwtError::Revoked => ApiError::TokenRevoked,
            // Fail-closed: an unreachable store rejects the token like any other failure
            JwtError::InvalidSignature
            | JwtError::MalformedClaims(_)
            | JwtError::WrongTokenType
            | JwtError::IdentityMismatch
            | JwtError::RotationNotNeeded
            | JwtError::RevocationUnavailable => ApiError::InvalidToken,
            JwtError::Encoding(msg) => {
                tracing::error!("Token encoding failed: {}", msg);
                ApiError::Internal
            }
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        tracing::debug!("Refresh cookie rejected: {}", err);
        match err {
            CodecError::EmptyKey | CodecError::Compress(_) => ApiError::Internal,
            CodecError::Base64(_)
            | CodecError::Decompress(_)
            | CodecError::Utf8
            | CodecError::TooLarge(_) => ApiError::InvalidToken,
        }
    }
}

impl From<RevocationError> for ApiError {
    fn from(err: RevocationError) -> Self {
        tracing::error!("Revocation store error: {:?}", err);
        ApiError::ServiceUnavailable
    }
}

impl From<HelpdeskError> for ApiError {
    fn from(err: HelpdeskError) -> Self {
        match err {
            HelpdeskError::Auth(_) => ApiError::InvalidCredentials,
            HelpdeskError::Validation(msg) => ApiError::BadRequest(msg),
            HelpdeskError::NotFound(_) => ApiError::InvalidCredentials,
            HelpdeskError::Storage(msg) => {
                tracing::error!("Database error: {}", msg);
                ApiError::Database(msg)
            }
            HelpdeskError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError::Internal
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_token_failures_are_unauthorized() {
        for err in [
            JwtError::InvalidSignature,
            JwtError::Expired,
            JwtError::Revoked,
            JwtError::MalformedClaims("bad".into()),
            JwtError::WrongTokenType,
            JwtError::IdentityMismatch,
            JwtError::RotationNotNeeded,
            JwtError::RevocationUnavailable,
        ] {
            assert_eq!(status_of(ApiError::from(err)), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            status_of(ApiError::from(JwtError::Encoding("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cookie_and_store_failures() {
        assert_eq!(
            status_of(ApiError::from(CodecError::Base64("x".into()))),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(ApiError::MissingRefreshCookie), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ApiError::from(RevocationError::Unavailable("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::TokenRevoked.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "TOKEN_REVOKED");
        assert_eq!(body["error"]["message"], "Token has been revoked");
    }
}
