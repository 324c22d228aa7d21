//! Password lifecycle endpoints: forgot, verify-otp, reset, change.
//!
//! Forgot-password and verify-otp are shaped to resist account enumeration:
//! the response for an unknown email is byte-identical to the response for a
//! known one (modulo the development-only `debugOtp`), and every OTP/reset
//! check failure collapses into one generic error.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, Envelope};

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{
    apply_password_change, apply_password_reset, latest_unused_otp, lookup_active_user_by_email,
    lookup_active_user_by_id, mark_otp_used, record_otp,
};
use super::tokens::{self, TokenKind};
use super::types::{
    ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse, MessageResponse,
    ResetPasswordRequest, VerifyOtpRequest, VerifyOtpResponse,
};
use super::utils::{
    extract_client_ip, generate_otp, hash_secret, normalize_email, valid_email, valid_otp,
    validate_password_policy, verify_secret,
};

const GENERIC_FORGOT_MESSAGE: &str =
    "If an account exists for that address, a reset code has been sent.";

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code issued if the account exists", body = ForgotPasswordResponse),
        (status = 400, description = "Malformed payload"),
        (status = 500, description = "Mail delivery not configured in production")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }

    let config = auth_state.config();

    // Checked before the account lookup so the failure is uniform across
    // existing and unknown addresses.
    if config.is_production() && !auth_state.mailer().is_configured() {
        error!("password reset requested but mail delivery is not configured");
        return Err(ApiError::MailUnavailable);
    }

    let otp_ttl_minutes = config.otp_ttl_minutes();
    let user = lookup_active_user_by_email(&pool, &email).await?;

    let Some(user) = user else {
        // Same message, same fields, same status as the real path.
        let expires_at = Utc
            .timestamp_opt(auth_state.clock().now_unix() + otp_ttl_minutes * 60, 0)
            .single()
            .map_or_else(|| Utc::now().to_rfc3339(), |at| at.to_rfc3339());
        return Ok((
            StatusCode::OK,
            Json(Envelope::ok(ForgotPasswordResponse {
                message: GENERIC_FORGOT_MESSAGE.to_string(),
                otp_expires_at: expires_at,
                debug_otp: None,
            })),
        ));
    };

    let otp = generate_otp();
    let otp_hash = hash_secret(&otp)?;
    // Recording the new code invalidates every prior unused one.
    let expires_at = record_otp(&pool, &email, &otp_hash, otp_ttl_minutes).await?;

    if let Err(err) = auth_state
        .mailer()
        .send_password_reset_otp(&user.email, &otp, otp_ttl_minutes)
    {
        error!("Failed to dispatch password reset mail: {err}");
    }

    let debug_otp = if config.is_production() {
        None
    } else {
        Some(otp)
    };

    Ok((
        StatusCode::OK,
        Json(Envelope::ok(ForgotPasswordResponse {
            message: GENERIC_FORGOT_MESSAGE.to_string(),
            otp_expires_at: expires_at.to_rfc3339(),
            debug_otp,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP consumed; reset token issued", body = VerifyOtpResponse),
        (status = 400, description = "Malformed payload or OTP format"),
        (status = 401, description = "Invalid or expired OTP"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }
    // Format check happens before any storage lookup.
    let otp = request.otp.trim();
    if !valid_otp(otp) {
        return Err(ApiError::Validation(
            "OTP must be exactly 6 digits".to_string(),
        ));
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::VerifyOtp)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::VerifyOtp)
            == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    // One generic failure for absent, expired, and mismatched codes.
    let Some(otp_record) = latest_unused_otp(&pool, &email).await? else {
        warn!(
            reason = "otp_not_found",
            path = "/v1/auth/verify-otp",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "otp rejected"
        );
        return Err(ApiError::InvalidOrExpiredOtp);
    };
    if !verify_secret(otp, &otp_record.otp_hash) {
        warn!(
            reason = "otp_mismatch",
            path = "/v1/auth/verify-otp",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "otp rejected"
        );
        return Err(ApiError::InvalidOrExpiredOtp);
    }
    let Some(user) = lookup_active_user_by_email(&pool, &email).await? else {
        warn!(
            reason = "otp_user_missing",
            path = "/v1/auth/verify-otp",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "otp rejected"
        );
        return Err(ApiError::InvalidOrExpiredOtp);
    };

    // Single use: consumed before the reset token exists.
    mark_otp_used(&pool, otp_record.id).await?;

    let config = auth_state.config();
    let now = auth_state.clock().now_unix();
    let reset_token =
        tokens::issue_reset_token(config, now, user.id, &user.email).map_err(|err| {
            error!("failed to issue reset token: {err}");
            ApiError::Internal
        })?;

    Ok((
        StatusCode::OK,
        Json(Envelope::ok(VerifyOtpResponse {
            reset_token,
            expires_in: config.reset_token_ttl_minutes() * 60,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Malformed payload or weak password"),
        (status = 401, description = "Invalid or expired reset token")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let reset_token = request.reset_token.trim();
    if reset_token.is_empty() {
        return Err(ApiError::Validation("Missing reset token".to_string()));
    }

    let client_ip = extract_client_ip(&headers);
    let config = auth_state.config();
    let now = auth_state.clock().now_unix();

    let claims = match tokens::verify(
        reset_token,
        config.reset_token_secret(),
        TokenKind::PasswordReset,
        now,
    ) {
        Ok(claims) => claims,
        Err(err) => {
            warn!(
                reason = %err,
                path = "/v1/auth/reset-password",
                ip = client_ip.as_deref().unwrap_or("unknown"),
                "reset token rejected"
            );
            return Err(ApiError::InvalidOrExpiredResetToken);
        }
    };

    validate_password_policy(&request.new_password).map_err(ApiError::Validation)?;

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        warn!(
            reason = "invalid_subject",
            path = "/v1/auth/reset-password",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "reset token rejected"
        );
        return Err(ApiError::InvalidOrExpiredResetToken);
    };
    // Subject must still exist, be active, and carry the exact email the
    // token was minted for.
    let Some(user) = lookup_active_user_by_id(&pool, user_id).await? else {
        warn!(
            reason = "subject_missing",
            path = "/v1/auth/reset-password",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "reset token rejected"
        );
        return Err(ApiError::InvalidOrExpiredResetToken);
    };
    if user.email != claims.email {
        warn!(
            reason = "email_mismatch",
            path = "/v1/auth/reset-password",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "reset token rejected"
        );
        return Err(ApiError::InvalidOrExpiredResetToken);
    }

    let new_hash = hash_secret(&request.new_password)?;
    // New hash, mass refresh-token revocation, and OTP cleanup are atomic.
    apply_password_reset(&pool, user.id, &user.email, &new_hash).await?;

    Ok((
        StatusCode::OK,
        Json(Envelope::ok(MessageResponse {
            message: "Password has been reset".to_string(),
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; other sessions revoked", body = MessageResponse),
        (status = 400, description = "Malformed payload, weak or unchanged password"),
        (status = 401, description = "Missing token or wrong current password")
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal =
        super::principal::require_auth(&headers, "/v1/auth/change-password", &auth_state)?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.current_password.is_empty() {
        return Err(ApiError::Validation("Missing current password".to_string()));
    }

    let Some(user) = lookup_active_user_by_id(&pool, principal.user_id).await? else {
        return Err(ApiError::UserNotFound);
    };

    if !verify_secret(&request.current_password, &user.password_hash) {
        let client_ip = extract_client_ip(&headers);
        warn!(
            reason = "wrong_current_password",
            path = "/v1/auth/change-password",
            ip = client_ip.as_deref().unwrap_or("unknown"),
            "password change rejected"
        );
        return Err(ApiError::InvalidCredentials);
    }

    // Compared through the stored hash, not plaintext equality.
    if verify_secret(&request.new_password, &user.password_hash) {
        return Err(ApiError::Validation(
            "New password must differ from the current password".to_string(),
        ));
    }

    validate_password_policy(&request.new_password).map_err(ApiError::Validation)?;

    let new_hash = hash_secret(&request.new_password)?;
    // Hash swap and mass revocation are atomic; every other session dies.
    apply_password_change(&pool, user.id, &new_hash).await?;

    Ok((
        StatusCode::OK,
        Json(Envelope::ok(MessageResponse {
            message: "Password changed; sign in again on other devices".to_string(),
        })),
    ))
}
