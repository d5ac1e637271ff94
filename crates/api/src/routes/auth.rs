//! Authentication routes: login, refresh and logout

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{bearer_token, verify_password, AuthUser, JwtError},
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::SuccessResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Exchange credentials for an access token and a refresh cookie
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    }

    let account = state
        .accounts
        .find_by_email(&email)
        .await?
        .ok_or_else(|| {
            tracing::info!("Login failed: unknown account");
            ApiError::InvalidCredentials
        })?;

    let valid = verify_password(&req.password, &account.password_hash).map_err(|e| {
        tracing::error!(user_id = %account.identity.id, error = %e, "Stored password hash is unusable");
        ApiError::InvalidCredentials
    })?;
    if !valid {
        tracing::info!(user_id = %account.identity.id, "Login failed: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let pair = state.jwt_manager.issue_pair(&account.identity)?;
    let encoded = state.codec.encode_token(&pair.refresh_token)?;

    let cookie = state
        .cookie_settings()
        .build(encoded, state.jwt_manager.refresh_token_ttl());

    tracing::info!(
        user_id = %account.identity.id,
        role = %account.identity.role,
        "Login successful"
    );

    Ok((
        [(SET_COOKIE, cookie.to_string())],
        Json(SuccessResponse::new(AccessTokenResponse {
            access_token: pair.access_token,
        })),
    ))
}

/// Renew an expired access token using the refresh cookie
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse<AccessTokenResponse>>> {
    let cookie_settings = state.cookie_settings();
    let encoded = cookie_settings
        .read(&headers)
        .ok_or(ApiError::MissingRefreshCookie)?;
    let refresh_token = state.codec.decode_token(&encoded)?;
    let access_token = bearer_token(&headers)?;

    let access_token = state
        .jwt_manager
        .rotate(access_token, &refresh_token)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Token refresh rejected");
            ApiError::from(e)
        })?;

    Ok(Json(SuccessResponse::new(AccessTokenResponse { access_token })))
}

/// Revoke the caller's access token and refresh cookie.
///
/// The cookie must carry a refresh token this server signed for the same
/// subject as the access token. One that has already expired or been revoked
/// needs no new entry.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let cookie_settings = state.cookie_settings();
    let encoded = cookie_settings
        .read(&headers)
        .ok_or(ApiError::MissingRefreshCookie)?;
    let refresh_token = state.codec.decode_token(&encoded)?;

    let jwt = &state.jwt_manager;
    let refresh_claims = match jwt.validate_refresh(&refresh_token).await {
        Ok(claims) if claims.data.id == auth_user.claims.data.id => Some(claims),
        Ok(claims) => {
            tracing::warn!(
                user_id = %auth_user.claims.data.id,
                refresh_subject = %claims.data.id,
                "Logout rejected: refresh cookie belongs to another subject"
            );
            return Err(JwtError::IdentityMismatch.into());
        }
        Err(JwtError::Expired | JwtError::Revoked) => None,
        Err(e) => {
            tracing::info!(user_id = %auth_user.claims.data.id, error = %e, "Logout rejected: bad refresh cookie");
            return Err(e.into());
        }
    };

    let revocations = jwt.revocations();
    revocations
        .revoke(&auth_user.token, jwt.revocation_ttl(&auth_user.claims))
        .await?;
    if let Some(claims) = refresh_claims {
        revocations
            .revoke(&refresh_token, jwt.revocation_ttl(&claims))
            .await?;
    }

    tracing::info!(user_id = %auth_user.claims.data.id, "User logged out");

    Ok((
        [(SET_COOKIE, cookie_settings.clear().to_string())],
        Json(SuccessResponse::new("Logged out successfully")),
    ))
}
