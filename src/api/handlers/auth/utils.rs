//! Small helpers for auth validation, hashing, and OTP handling.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// OTPs are exactly six digits; checked before any storage lookup.
pub(super) fn valid_otp(otp: &str) -> bool {
    Regex::new(r"^\d{6}$").is_ok_and(|regex| regex.is_match(otp))
}

/// Generate a new 6-digit password-reset code.
pub(super) fn generate_otp() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{value:06}")
}

/// Hash a refresh token for the ledger index.
///
/// SHA-256 is deliberate here: the token is already high-entropy and signed,
/// so a fast preimage-resistant hash is enough for a lookup key. The slow
/// password hash below is reserved for low-entropy inputs.
pub(super) fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash a password (or a 6-digit OTP, which is low-entropy and needs the
/// same deliberately expensive treatment) into a PHC string.
pub(super) fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash secret: {err}"))
}

/// Constant-time verification of a password/OTP against its PHC string.
pub(super) fn verify_secret(secret: &str, phc_hash: &str) -> bool {
    PasswordHash::new(phc_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    })
}

/// New passwords must mix upper, lower, digit, and symbol, at 8+ chars.
pub(super) fn validate_password_policy(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit".to_string());
    }
    if password.chars().all(char::is_alphanumeric) {
        return Err("Password must contain a symbol".to_string());
    }
    Ok(())
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a client IP for rate limiting and security logs from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@School.EDU "), "alice@school.edu");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@school.edu"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn valid_otp_requires_exactly_six_digits() {
        assert!(valid_otp("000000"));
        assert!(valid_otp("123456"));
        assert!(!valid_otp("12345"));
        assert!(!valid_otp("1234567"));
        assert!(!valid_otp("12345a"));
        assert!(!valid_otp(" 123456"));
    }

    #[test]
    fn generate_otp_is_six_digits() {
        for _ in 0..32 {
            let otp = generate_otp();
            assert!(valid_otp(&otp), "bad otp: {otp}");
        }
    }

    #[test]
    fn hash_refresh_token_stable() {
        let first = hash_refresh_token("token");
        let second = hash_refresh_token("token");
        let different = hash_refresh_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn secret_hash_round_trip() {
        let hash = hash_secret("Admin123!").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret("Admin123!", &hash));
        assert!(!verify_secret("Admin123?", &hash));
    }

    #[test]
    fn verify_secret_rejects_garbage_hash() {
        assert!(!verify_secret("password", "not-a-phc-string"));
    }

    #[test]
    fn password_policy_requires_all_classes() {
        assert!(validate_password_policy("Admin123!").is_ok());
        assert!(validate_password_policy("Ab1!xyzw").is_ok());
        assert!(validate_password_policy("short1!").is_err());
        assert!(validate_password_policy("alllower1!").is_err());
        assert!(validate_password_policy("ALLUPPER1!").is_err());
        assert!(validate_password_policy("NoDigits!!").is_err());
        assert!(validate_password_policy("NoSymbol123").is_err());
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn extract_client_ip_none_when_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);
    }
}
