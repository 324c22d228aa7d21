//! Roles and request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed set of roles known to the platform.
///
/// `Superadmin` is the only role that may act across schools; every other
/// role is bound to exactly one school. Authorization decisions branch on
/// this enum once, at the boundary, never on raw role strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Superadmin,
    Schooladmin,
    Teacher,
    Accountant,
    Parent,
    Student,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Superadmin => "SUPERADMIN",
            Self::Schooladmin => "SCHOOLADMIN",
            Self::Teacher => "TEACHER",
            Self::Accountant => "ACCOUNTANT",
            Self::Parent => "PARENT",
            Self::Student => "STUDENT",
        }
    }

    /// Parse the database/text representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUPERADMIN" => Some(Self::Superadmin),
            "SCHOOLADMIN" => Some(Self::Schooladmin),
            "TEACHER" => Some(Self::Teacher),
            "ACCOUNTANT" => Some(Self::Accountant),
            "PARENT" => Some(Self::Parent),
            "STUDENT" => Some(Self::Student),
            _ => None,
        }
    }

    /// The platform-wide role allowed to act across schools.
    #[must_use]
    pub const fn is_platform(self) -> bool {
        matches!(self, Self::Superadmin)
    }

    /// Capability: user directory listing.
    #[must_use]
    pub const fn can_list_users(self) -> bool {
        matches!(self, Self::Superadmin | Self::Schooladmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub reset_token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub user: UserResponse,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    pub otp_expires_at: String,
    /// Echoed outside production only, for local testing without a relay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_otp: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub reset_token: String,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn role_round_trips_through_text() {
        for role in [
            Role::Superadmin,
            Role::Schooladmin,
            Role::Teacher,
            Role::Accountant,
            Role::Parent,
            Role::Student,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("JANITOR"), None);
    }

    #[test]
    fn role_serde_uses_screaming_case() -> Result<()> {
        let value = serde_json::to_value(Role::Schooladmin)?;
        assert_eq!(value, serde_json::json!("SCHOOLADMIN"));
        let decoded: Role = serde_json::from_value(serde_json::json!("SUPERADMIN"))?;
        assert_eq!(decoded, Role::Superadmin);
        Ok(())
    }

    #[test]
    fn only_superadmin_is_platform() {
        assert!(Role::Superadmin.is_platform());
        assert!(!Role::Schooladmin.is_platform());
        assert!(!Role::Student.is_platform());
    }

    #[test]
    fn user_listing_capability() {
        assert!(Role::Superadmin.can_list_users());
        assert!(Role::Schooladmin.can_list_users());
        assert!(!Role::Teacher.can_list_users());
        assert!(!Role::Parent.can_list_users());
    }

    #[test]
    fn session_tokens_response_uses_camel_case() -> Result<()> {
        let response = SessionTokensResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            user: UserResponse {
                id: "id".to_string(),
                email: "alice@school.edu".to_string(),
                role: Role::Schooladmin,
                school_id: None,
                last_login_at: None,
            },
        };
        let value = serde_json::to_value(&response)?;
        let access = value
            .get("accessToken")
            .and_then(serde_json::Value::as_str)
            .context("missing accessToken")?;
        assert_eq!(access, "a");
        assert!(value.get("refreshToken").is_some());
        assert!(value["user"].get("schoolId").is_none());
        Ok(())
    }

    #[test]
    fn reset_password_request_round_trips() -> Result<()> {
        let decoded: ResetPasswordRequest = serde_json::from_value(serde_json::json!({
            "resetToken": "token",
            "newPassword": "Str0ng!pw",
        }))?;
        assert_eq!(decoded.reset_token, "token");
        assert_eq!(decoded.new_password, "Str0ng!pw");
        Ok(())
    }
}
