//! Session endpoints: login, refresh, logout, and the authenticated profile.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::error::{ApiError, Envelope};

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{
    LedgerOutcome, UserRecord, lookup_active_user_by_email, lookup_active_user_by_id,
    lookup_live_refresh_user, persist_login, revoke_refresh_token, rotate_refresh_token,
};
use super::tokens::{self, TokenKind};
use super::types::{
    LoginRequest, LogoutRequest, MeResponse, MessageResponse, RefreshRequest,
    SessionTokensResponse, UserResponse,
};
use super::utils::{
    extract_client_ip, hash_refresh_token, normalize_email, valid_email, verify_secret,
};

pub(super) fn user_response(user: &UserRecord) -> UserResponse {
    UserResponse {
        id: user.id.to_string(),
        email: user.email.clone(),
        role: user.role,
        school_id: user.school_id.map(|id| id.to_string()),
        last_login_at: user.last_login_at.map(|at| at.to_rfc3339()),
    }
}

fn token_failure(err: tokens::TokenError) -> ApiError {
    error!("failed to issue token: {err}");
    ApiError::Internal
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionTokensResponse),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }
    if request.password.is_empty() {
        return Err(ApiError::Validation("Missing password".to_string()));
    }

    // Rate limits come before any credential work to keep guessing expensive.
    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::Login)
            == RateLimitDecision::Limited
    {
        warn!(
            reason = "rate_limited",
            path = "/v1/auth/login",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "login rejected"
        );
        return Err(ApiError::RateLimited);
    }

    // Unknown email and wrong password produce the same error; the log line
    // keeps the distinction for abuse detection.
    let user = lookup_active_user_by_email(&pool, &email).await?;
    let Some(user) = user else {
        warn!(
            reason = "unknown_email",
            path = "/v1/auth/login",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "login rejected"
        );
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_secret(&request.password, &user.password_hash) {
        warn!(
            reason = "wrong_password",
            path = "/v1/auth/login",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "login rejected"
        );
        return Err(ApiError::InvalidCredentials);
    }

    let config = auth_state.config();
    let now = auth_state.clock().now_unix();
    let access_token =
        tokens::issue_access_token(config, now, user.id, &user.email, user.role, user.school_id)
            .map_err(token_failure)?;
    let issued =
        tokens::issue_refresh_token(config, now, user.id, &user.email, user.role, user.school_id)
            .map_err(token_failure)?;

    // Ledger entry and last-login stamp land in one transaction.
    let token_hash = hash_refresh_token(&issued.token);
    match persist_login(&pool, user.id, &token_hash, issued.expires_at).await? {
        LedgerOutcome::DuplicateToken => {
            return Err(ApiError::Conflict(
                "Refresh token already recorded".to_string(),
            ));
        }
        LedgerOutcome::Recorded => {}
    }

    let response = SessionTokensResponse {
        access_token,
        refresh_token: issued.token,
        user: user_response(&user),
    };
    Ok((StatusCode::OK, Json(Envelope::ok(response))))
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session rotated", body = SessionTokensResponse),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Invalid or revoked refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let refresh_token = request.refresh_token.trim();
    if refresh_token.is_empty() {
        return Err(ApiError::Validation("Missing refresh token".to_string()));
    }

    let client_ip = extract_client_ip(&headers);
    let config = auth_state.config();
    let now = auth_state.clock().now_unix();

    // Signature/kind/expiry first; the ledger never sees unverified tokens.
    if let Err(err) = tokens::verify(
        refresh_token,
        config.refresh_token_secret(),
        TokenKind::Refresh,
        now,
    ) {
        warn!(
            reason = %err,
            path = "/v1/auth/refresh",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "refresh rejected"
        );
        return Err(ApiError::InvalidOrRevokedRefreshToken);
    }

    // Ledger check: present, unrevoked, unexpired, active owner. One generic
    // error for all of it.
    let old_hash = hash_refresh_token(refresh_token);
    let Some(user) = lookup_live_refresh_user(&pool, &old_hash).await? else {
        warn!(
            reason = "revoked_or_unknown",
            path = "/v1/auth/refresh",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "refresh rejected"
        );
        return Err(ApiError::InvalidOrRevokedRefreshToken);
    };

    let access_token =
        tokens::issue_access_token(config, now, user.id, &user.email, user.role, user.school_id)
            .map_err(token_failure)?;
    let issued =
        tokens::issue_refresh_token(config, now, user.id, &user.email, user.role, user.school_id)
            .map_err(token_failure)?;

    // Rotation: the old token dies the moment the new one exists.
    let new_hash = hash_refresh_token(&issued.token);
    match rotate_refresh_token(&pool, &old_hash, user.id, &new_hash, issued.expires_at).await? {
        LedgerOutcome::DuplicateToken => {
            return Err(ApiError::Conflict(
                "Refresh token already recorded".to_string(),
            ));
        }
        LedgerOutcome::Recorded => {}
    }

    let response = SessionTokensResponse {
        access_token,
        refresh_token: issued.token,
        user: user_response(&user),
    };
    Ok((StatusCode::OK, Json(Envelope::ok(response))))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    pool: Extension<PgPool>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    // Logout is idempotent and never reveals whether the token was live.
    if let Some(Json(request)) = payload {
        if let Some(refresh_token) = request.refresh_token {
            let refresh_token = refresh_token.trim();
            if !refresh_token.is_empty() {
                let token_hash = hash_refresh_token(refresh_token);
                if let Err(err) = revoke_refresh_token(&pool, &token_hash).await {
                    error!("Failed to revoke refresh token during logout: {err}");
                }
            }
        }
    }

    Ok((
        StatusCode::OK,
        Json(Envelope::ok(MessageResponse {
            message: "Logged out".to_string(),
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated profile", body = MeResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Account no longer exists or is inactive")
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = super::principal::require_auth(&headers, "/v1/auth/me", &auth_state)?;

    let Some(user) = lookup_active_user_by_id(&pool, principal.user_id).await? else {
        return Err(ApiError::UserNotFound);
    };

    Ok((
        StatusCode::OK,
        Json(Envelope::ok(MeResponse {
            user: user_response(&user),
        })),
    ))
}
