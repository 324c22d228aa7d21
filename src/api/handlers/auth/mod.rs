//! Auth handlers and supporting modules.
//!
//! This module coordinates credential verification, the token lifecycle
//! (issue, rotate, revoke), and tenant scoping.
//!
//! ## Token Secrets
//!
//! Each token kind signs with its own HS256 secret. The password-reset
//! secret may fall back to the refresh secret when unset; the server action
//! warns about that at startup because it weakens key separation.
//!
//! ## Ledger
//!
//! Refresh tokens are stored as SHA-256 hashes, password-reset OTPs as
//! Argon2id hashes. Revocation is a timestamp, never a delete, so the ledger
//! doubles as an audit trail.

pub(crate) mod password;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod session;
mod state;
mod storage;
mod tenant;
mod tokens;
pub(crate) mod types;
mod utils;

pub use principal::Principal;
pub use rate_limit::{FixedWindowRateLimiter, NoopRateLimiter};
pub use state::{AuthConfig, AuthState, Clock, RuntimeMode, SystemClock};
pub use types::Role;

pub(crate) use principal::require_auth;
pub(crate) use tenant::resolve_school_scope;
