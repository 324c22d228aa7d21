//! Typed API errors and the JSON response envelope.
//!
//! Every handler returns `Result<_, ApiError>`; this module is the single
//! boundary where domain failures become HTTP responses. Untyped failures
//! (storage, hashing) are logged server-side and collapse to a generic
//! internal error so no internals leak to callers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing access token")]
    MissingToken,

    #[error("Access token expired")]
    TokenExpired,

    #[error("Refresh token presented as access token; use the refresh endpoint instead")]
    RefreshUsedAsAccess,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or revoked refresh token")]
    InvalidOrRevokedRefreshToken,

    #[error("Invalid or expired OTP")]
    InvalidOrExpiredOtp,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredResetToken,

    #[error("A school context is required for this request")]
    TenantContextRequired,

    #[error("Account is not attached to a school")]
    TenantContextMissing,

    #[error("Access to another school's data is denied")]
    CrossTenantAccessDenied,

    #[error("Role is not permitted to perform this action")]
    InsufficientRole,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Too many attempts; try again later")]
    RateLimited,

    #[error("Mail delivery is not configured")]
    MailUnavailable,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Machine-readable code carried in the error envelope.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MissingToken => "MISSING_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::RefreshUsedAsAccess => "REFRESH_USED_AS_ACCESS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidCredentials => "UNAUTHORIZED",
            Self::InvalidOrRevokedRefreshToken => "INVALID_OR_REVOKED_REFRESH_TOKEN",
            Self::InvalidOrExpiredOtp => "INVALID_OR_EXPIRED_OTP",
            Self::InvalidOrExpiredResetToken => "INVALID_OR_EXPIRED_RESET_TOKEN",
            Self::TenantContextRequired => "TENANT_CONTEXT_REQUIRED",
            Self::TenantContextMissing => "TENANT_CONTEXT_MISSING",
            Self::CrossTenantAccessDenied => "CROSS_TENANT_ACCESS_DENIED",
            Self::InsufficientRole => "INSUFFICIENT_ROLE",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::MailUnavailable => "MAIL_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,

            Self::MissingToken
            | Self::TokenExpired
            | Self::RefreshUsedAsAccess
            | Self::InvalidToken
            | Self::InvalidCredentials
            | Self::InvalidOrRevokedRefreshToken
            | Self::InvalidOrExpiredOtp
            | Self::InvalidOrExpiredResetToken => StatusCode::UNAUTHORIZED,

            Self::TenantContextRequired
            | Self::TenantContextMissing
            | Self::CrossTenantAccessDenied
            | Self::InsufficientRole => StatusCode::FORBIDDEN,

            Self::UserNotFound => StatusCode::NOT_FOUND,

            Self::Conflict(_) => StatusCode::CONFLICT,

            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            Self::MailUnavailable | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "internal failure");
        Self::Internal
    }
}

/// Error half of the response envelope.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// JSON response envelope carried by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            }),
        };
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::CrossTenantAccessDenied.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::UserNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::MailUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn credentials_code_does_not_leak_cause() {
        // Unknown email and wrong password must serialize identically.
        assert_eq!(ApiError::InvalidCredentials.code(), "UNAUTHORIZED");
        assert_eq!(
            ApiError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
    }

    #[test]
    fn envelope_skips_absent_halves() {
        let ok = serde_json::to_value(Envelope::ok(serde_json::json!({"n": 1})))
            .expect("serialize envelope");
        assert_eq!(ok["success"], true);
        assert!(ok.get("error").is_none());

        let err: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: "INTERNAL_ERROR".to_string(),
                message: "Internal server error".to_string(),
            }),
        };
        let err = serde_json::to_value(err).expect("serialize envelope");
        assert_eq!(err["success"], false);
        assert!(err.get("data").is_none());
        assert_eq!(err["error"]["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn anyhow_collapses_to_internal() {
        let err: ApiError = anyhow::anyhow!("pool timed out").into();
        assert!(matches!(err, ApiError::Internal));
        // Internal details never reach the caller.
        assert_eq!(err.to_string(), "Internal server error");
    }
}
