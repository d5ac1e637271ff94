//! Bearer token extraction and the authentication middleware

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{error::ApiError, state::AppState};

use super::jwt::Claims;

/// Authenticated principal attached to protected requests
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    /// The raw access token, kept for logout
    pub token: String,
}

/// Parse an `Authorization` header value of the form `Bearer <token>`
pub fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Extract the bearer token from request headers.
/// Absent and malformed headers are both rejected.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::MissingAuthorization)?
        .to_str()
        .map_err(|_| ApiError::MalformedAuthorization)?;
    parse_bearer(value).ok_or(ApiError::MalformedAuthorization)
}

/// Require a valid, unrevoked access token
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?.to_string();

    let claims = state.jwt_manager.validate_access(&token).await.map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(AuthUser { claims, token });
    Ok(next.run(request).await)
}
