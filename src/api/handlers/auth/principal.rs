//! Authenticated principal extraction.
//!
//! Flow Overview: find a candidate access token among the request headers
//! and cookies, verify it against the access secret, and hand back a
//! principal downstream handlers can use. Verification failures run a
//! second, explicit probe against the refresh secret so a refresh token
//! pasted into the Authorization header gets a pointed error instead of a
//! generic rejection. Every rejection emits one structured security log
//! line before returning.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use tracing::warn;
use uuid::Uuid;

use crate::api::error::ApiError;

use super::state::AuthState;
use super::tokens::{self, TokenError, TokenKind};
use super::types::Role;
use super::utils::extract_client_ip;

/// Header names consulted after `Authorization`, in order. The misspelling
/// is accepted because enough clients send it.
const ALTERNATE_HEADERS: [&str; 3] = ["authorisation", "x-access-token", "x-auth-token"];

const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Authenticated caller identity derived from a verified access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub school_id: Option<Uuid>,
}

/// Resolve the request's access token into a principal, or reject with a
/// specific 401 error.
pub(crate) fn require_auth(
    headers: &HeaderMap,
    path: &str,
    state: &AuthState,
) -> Result<Principal, ApiError> {
    let ip = extract_client_ip(headers);

    let Some(token) = extract_access_candidate(headers) else {
        log_rejection("missing_token", path, ip.as_deref());
        return Err(ApiError::MissingToken);
    };

    let now = state.clock().now_unix();
    let access_result = tokens::verify(
        &token,
        state.config().access_token_secret(),
        TokenKind::Access,
        now,
    );

    match access_result {
        Ok(claims) => {
            let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
                log_rejection("invalid_subject", path, ip.as_deref());
                return Err(ApiError::InvalidToken);
            };
            let Some(role) = claims.role else {
                log_rejection("missing_role", path, ip.as_deref());
                return Err(ApiError::InvalidToken);
            };
            Ok(Principal {
                user_id,
                email: claims.email,
                role,
                school_id: claims.school_id,
            })
        }
        Err(TokenError::Expired) => {
            // Distinct from generic invalidity so clients know to refresh.
            log_rejection("token_expired", path, ip.as_deref());
            Err(ApiError::TokenExpired)
        }
        Err(TokenError::WrongKind {
            found: TokenKind::Refresh,
            ..
        }) => {
            // Shared-secret edge: the kind claim alone exposed the misuse.
            log_rejection("refresh_used_as_access", path, ip.as_deref());
            Err(ApiError::RefreshUsedAsAccess)
        }
        Err(_) => {
            // Second stage: probe the refresh secret before giving up, so a
            // refresh token in the wrong slot is reported as exactly that.
            let refresh_probe = tokens::verify(
                &token,
                state.config().refresh_token_secret(),
                TokenKind::Refresh,
                now,
            );
            if refresh_probe.is_ok() {
                log_rejection("refresh_used_as_access", path, ip.as_deref());
                return Err(ApiError::RefreshUsedAsAccess);
            }
            log_rejection("invalid_token", path, ip.as_deref());
            Err(ApiError::InvalidToken)
        }
    }
}

fn log_rejection(reason: &str, path: &str, ip: Option<&str>) {
    warn!(
        reason,
        path,
        ip = ip.unwrap_or("unknown"),
        "access token rejected"
    );
}

/// Pick the first non-empty token candidate from the request.
fn extract_access_candidate(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(clean_bearer)
    {
        return Some(token);
    }

    for name in ALTERNATE_HEADERS {
        if let Some(token) = headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(clean_bearer)
        {
            return Some(token);
        }
    }

    extract_cookie(headers, ACCESS_TOKEN_COOKIE)
}

/// Strip bearer prefixes and stray quoting from a header value.
///
/// Accepts `Bearer x`, `bearer x`, `"Bearer x"`, and the doubled
/// `Bearer Bearer x` some clients produce when they prepend the scheme to an
/// already-prefixed value.
fn clean_bearer(value: &str) -> Option<String> {
    let mut token = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    loop {
        let lowered = token.to_lowercase();
        let Some(rest) = lowered.strip_prefix("bearer") else {
            break;
        };
        if !rest.starts_with(' ') && !rest.is_empty() {
            // "bearerish" tokens are not a scheme prefix.
            break;
        }
        token = token[("bearer".len())..].trim_start();
    }
    let token = token.trim_matches(|c| c == '"' || c == '\'').trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::test_support::test_state;
    use crate::api::handlers::auth::tokens::{issue_access_token, issue_refresh_token};
    use axum::http::HeaderValue;

    const NOW: i64 = 1_700_000_000;

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        );
        headers
    }

    #[test]
    fn clean_bearer_handles_quoting_and_doubled_prefixes() {
        assert_eq!(clean_bearer("Bearer abc"), Some("abc".to_string()));
        assert_eq!(clean_bearer("bearer abc"), Some("abc".to_string()));
        assert_eq!(clean_bearer("\"Bearer abc\""), Some("abc".to_string()));
        assert_eq!(clean_bearer("Bearer Bearer abc"), Some("abc".to_string()));
        assert_eq!(clean_bearer("Bearer \"abc\""), Some("abc".to_string()));
        assert_eq!(clean_bearer("abc"), Some("abc".to_string()));
        assert_eq!(clean_bearer("Bearer "), None);
        assert_eq!(clean_bearer("  "), None);
    }

    #[test]
    fn clean_bearer_keeps_bearerish_tokens() {
        assert_eq!(clean_bearer("bearerish"), Some("bearerish".to_string()));
    }

    #[test]
    fn candidate_prefers_authorization_header() {
        let mut headers = bearer_headers("from-auth");
        headers.insert("x-access-token", HeaderValue::from_static("from-alt"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("access_token=from-cookie"),
        );
        assert_eq!(
            extract_access_candidate(&headers),
            Some("from-auth".to_string())
        );
    }

    #[test]
    fn candidate_accepts_misspelled_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorisation", HeaderValue::from_static("Bearer typo"));
        assert_eq!(extract_access_candidate(&headers), Some("typo".to_string()));
    }

    #[test]
    fn candidate_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=cookie-token"),
        );
        assert_eq!(
            extract_access_candidate(&headers),
            Some("cookie-token".to_string())
        );
    }

    #[test]
    fn missing_token_is_rejected() {
        let state = test_state(NOW);
        let result = require_auth(&HeaderMap::new(), "/v1/auth/me", &state);
        assert!(matches!(result, Err(ApiError::MissingToken)));
    }

    #[test]
    fn valid_access_token_yields_principal() {
        let state = test_state(NOW);
        let school = Uuid::new_v4();
        let user = Uuid::new_v4();
        let token = issue_access_token(
            state.config(),
            NOW,
            user,
            "admin@school.edu",
            Role::Schooladmin,
            Some(school),
        )
        .expect("issue token");

        let principal =
            require_auth(&bearer_headers(&token), "/v1/auth/me", &state).expect("principal");
        assert_eq!(principal.user_id, user);
        assert_eq!(principal.email, "admin@school.edu");
        assert_eq!(principal.role, Role::Schooladmin);
        assert_eq!(principal.school_id, Some(school));
    }

    #[test]
    fn expired_access_token_is_distinct() {
        let state = test_state(NOW + 16 * 60);
        let token = issue_access_token(
            state.config(),
            NOW,
            Uuid::new_v4(),
            "admin@school.edu",
            Role::Teacher,
            None,
        )
        .expect("issue token");

        let result = require_auth(&bearer_headers(&token), "/v1/auth/me", &state);
        assert!(matches!(result, Err(ApiError::TokenExpired)));
    }

    #[test]
    fn refresh_token_as_access_is_called_out() {
        let state = test_state(NOW);
        let issued = issue_refresh_token(
            state.config(),
            NOW,
            Uuid::new_v4(),
            "admin@school.edu",
            Role::Teacher,
            None,
        )
        .expect("issue token");

        let result = require_auth(&bearer_headers(&issued.token), "/v1/auth/me", &state);
        assert!(matches!(result, Err(ApiError::RefreshUsedAsAccess)));
    }

    #[test]
    fn garbage_token_is_generic_invalid() {
        let state = test_state(NOW);
        let result = require_auth(&bearer_headers("garbage"), "/v1/auth/me", &state);
        assert!(matches!(result, Err(ApiError::InvalidToken)));
    }
}
