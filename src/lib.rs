//! # Aula (School Administration Backend — Auth Core)
//!
//! `aula` is the authentication and tenant-scoping core of a multi-tenant
//! school administration backend. It owns credential verification, the
//! access/refresh/password-reset token lifecycle, and the authorization rule
//! deciding which school's data a caller may touch.
//!
//! ## Tenant Model (Schools)
//!
//! Schools are the tenant boundary. Every user except the platform
//! `SUPERADMIN` belongs to exactly one school, and every tenant-scoped query
//! is constrained to a single school id resolved up front from the caller's
//! identity.
//!
//! ## Sessions & Tokens
//!
//! Authentication is password-based (Argon2id hashes at rest). Sessions are
//! a pair of HS256 JWTs: a short-lived access token presented on every
//! protected request and a longer-lived refresh token that is rotated on
//! use. Refresh tokens and password-reset codes are tracked in a persisted
//! ledger (hashes only) so they can be revoked and enforced single-use.
//!
//! ## Enumeration Resistance
//!
//! Login, forgot-password, and OTP verification return deliberately generic
//! results: callers cannot distinguish an unknown email from a wrong
//! password or an absent account from a present one.

pub mod api;
pub mod cli;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
