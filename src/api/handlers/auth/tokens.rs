//! Signed token minting and verification for the three session token kinds.
//!
//! Each kind carries a `kind` claim and is signed with its own secret, so a
//! token can never be replayed in another kind's verification context: the
//! signature check fails across secrets, and the `kind` claim is checked
//! even when two kinds share a secret (the reset-token fallback case).
//!
//! Expiry is validated against an injected clock rather than the library's
//! wall-clock check, so token lifetimes are deterministic under test.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::state::AuthConfig;
use super::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TokenKind {
    Access,
    Refresh,
    PasswordReset,
}

impl TokenKind {
    #[must_use]
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct TokenClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<Uuid>,
    pub kind: TokenKind,
    /// Unique token id; present on refresh and reset tokens so individual
    /// tokens can be revoked and hash collisions are impossible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub(crate) enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("wrong token kind: expected {expected}, found {found}")]
    WrongKind {
        expected: TokenKind,
        found: TokenKind,
    },
    #[error("invalid token")]
    Invalid,
    #[error("failed to sign token")]
    Signing,
}

/// A freshly minted token plus its expiry for the ledger row.
pub(crate) struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn sign(claims: &TokenClaims, secret: &SecretString) -> Result<String, TokenError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|_| TokenError::Signing)
}

fn expiry_datetime(exp: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(exp, 0).single().ok_or(TokenError::Signing)
}

pub(crate) fn issue_access_token(
    config: &AuthConfig,
    now: i64,
    user_id: Uuid,
    email: &str,
    role: Role,
    school_id: Option<Uuid>,
) -> Result<String, TokenError> {
    let claims = TokenClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: Some(role),
        school_id,
        kind: TokenKind::Access,
        jti: None,
        iat: now,
        exp: now + config.access_token_ttl_minutes() * 60,
    };
    sign(&claims, config.access_token_secret())
}

pub(crate) fn issue_refresh_token(
    config: &AuthConfig,
    now: i64,
    user_id: Uuid,
    email: &str,
    role: Role,
    school_id: Option<Uuid>,
) -> Result<IssuedToken, TokenError> {
    let exp = now + config.refresh_token_ttl_days() * 24 * 60 * 60;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: Some(role),
        school_id,
        kind: TokenKind::Refresh,
        jti: Some(Uuid::new_v4().to_string()),
        iat: now,
        exp,
    };
    Ok(IssuedToken {
        token: sign(&claims, config.refresh_token_secret())?,
        expires_at: expiry_datetime(exp)?,
    })
}

pub(crate) fn issue_reset_token(
    config: &AuthConfig,
    now: i64,
    user_id: Uuid,
    email: &str,
) -> Result<String, TokenError> {
    let claims = TokenClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: None,
        school_id: None,
        kind: TokenKind::PasswordReset,
        jti: Some(Uuid::new_v4().to_string()),
        iat: now,
        exp: now + config.reset_token_ttl_minutes() * 60,
    };
    sign(&claims, config.reset_token_secret())
}

/// Verify signature, kind, and expiry, returning the decoded claims.
///
/// Kind is checked before expiry so a misdirected token is reported as the
/// more specific failure; expiry uses the caller's clock.
pub(crate) fn verify(
    token: &str,
    secret: &SecretString,
    expected: TokenKind,
    now: i64,
) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.set_required_spec_claims::<&str>(&[]);

    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|_| TokenError::Invalid)?;

    let claims = data.claims;
    if claims.kind != expected {
        return Err(TokenError::WrongKind {
            expected,
            found: claims.kind,
        });
    }
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::test_support::test_config;

    const NOW: i64 = 1_700_000_000;

    fn user_id() -> Uuid {
        Uuid::nil()
    }

    #[test]
    fn access_token_round_trip() -> Result<(), TokenError> {
        let config = test_config();
        let token = issue_access_token(
            &config,
            NOW,
            user_id(),
            "admin@school.edu",
            Role::Schooladmin,
            None,
        )?;

        let claims = verify(&token, config.access_token_secret(), TokenKind::Access, NOW)?;
        assert_eq!(claims.sub, user_id().to_string());
        assert_eq!(claims.email, "admin@school.edu");
        assert_eq!(claims.role, Some(Role::Schooladmin));
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp, NOW + 15 * 60);
        assert!(claims.jti.is_none());
        Ok(())
    }

    #[test]
    fn refresh_token_carries_unique_jti() -> Result<(), TokenError> {
        let config = test_config();
        let school = Uuid::new_v4();
        let first = issue_refresh_token(
            &config,
            NOW,
            user_id(),
            "admin@school.edu",
            Role::Schooladmin,
            Some(school),
        )?;
        let second = issue_refresh_token(
            &config,
            NOW,
            user_id(),
            "admin@school.edu",
            Role::Schooladmin,
            Some(school),
        )?;
        // Same instant, same user; the jti alone must make the tokens differ.
        assert_ne!(first.token, second.token);
        assert_eq!(first.expires_at.timestamp(), NOW + 7 * 24 * 60 * 60);

        let claims = verify(
            &first.token,
            config.refresh_token_secret(),
            TokenKind::Refresh,
            NOW,
        )?;
        assert!(claims.jti.is_some());
        assert_eq!(claims.school_id, Some(school));
        Ok(())
    }

    #[test]
    fn expired_token_is_a_distinct_error() -> Result<(), TokenError> {
        let config = test_config();
        let token = issue_access_token(
            &config,
            NOW,
            user_id(),
            "admin@school.edu",
            Role::Teacher,
            None,
        )?;
        let result = verify(
            &token,
            config.access_token_secret(),
            TokenKind::Access,
            NOW + 16 * 60,
        );
        assert!(matches!(result, Err(TokenError::Expired)));
        Ok(())
    }

    #[test]
    fn wrong_secret_rejects_signature() -> Result<(), TokenError> {
        let config = test_config();
        let token = issue_access_token(
            &config,
            NOW,
            user_id(),
            "admin@school.edu",
            Role::Teacher,
            None,
        )?;
        // Refresh secret differs, so the signature check fails first.
        let result = verify(&token, config.refresh_token_secret(), TokenKind::Access, NOW);
        assert!(matches!(result, Err(TokenError::Invalid)));
        Ok(())
    }

    #[test]
    fn kind_mismatch_is_reported_under_a_shared_secret() -> Result<(), TokenError> {
        let config = test_config();
        let refresh = issue_refresh_token(
            &config,
            NOW,
            user_id(),
            "admin@school.edu",
            Role::Teacher,
            None,
        )?;
        let result = verify(
            &refresh.token,
            config.refresh_token_secret(),
            TokenKind::Access,
            NOW,
        );
        assert!(matches!(
            result,
            Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                found: TokenKind::Refresh,
            })
        ));
        Ok(())
    }

    #[test]
    fn reset_token_uses_fallback_secret() -> Result<(), TokenError> {
        // No dedicated reset secret configured: the refresh secret signs it.
        let config = test_config();
        let token = issue_reset_token(&config, NOW, user_id(), "admin@school.edu")?;
        let claims = verify(
            &token,
            config.refresh_token_secret(),
            TokenKind::PasswordReset,
            NOW,
        )?;
        assert_eq!(claims.kind, TokenKind::PasswordReset);
        assert_eq!(claims.exp, NOW + 10 * 60);
        assert!(claims.role.is_none());
        Ok(())
    }

    #[test]
    fn garbage_token_is_invalid() {
        let config = test_config();
        let result = verify(
            "not-a-jwt",
            config.access_token_secret(),
            TokenKind::Access,
            NOW,
        );
        assert!(matches!(result, Err(TokenError::Invalid)));
    }
}
