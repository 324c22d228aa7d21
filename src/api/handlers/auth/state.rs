//! Auth state, configuration, and time source.

use secrecy::SecretString;
use std::sync::Arc;

use crate::api::mail::Mailer;

use super::rate_limit::RateLimiter;

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;
const DEFAULT_RESET_TTL_MINUTES: i64 = 10;
const DEFAULT_OTP_TTL_MINUTES: i64 = 10;
const DEFAULT_LOGIN_WINDOW_SECONDS: u64 = 60;
const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_CORS_ORIGIN: &str = "https://app.aula.dev";

/// Runtime mode; drives debug-OTP echoing and whether missing mail
/// configuration is fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "development" => Some(Self::Development),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Injectable time source so token expiry is deterministic in tests.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug)]
pub struct AuthConfig {
    access_token_secret: SecretString,
    access_token_ttl_minutes: i64,
    refresh_token_secret: SecretString,
    refresh_token_ttl_days: i64,
    reset_token_secret: Option<SecretString>,
    reset_token_ttl_minutes: i64,
    otp_ttl_minutes: i64,
    login_rate_limit_window_seconds: u64,
    login_rate_limit_max: u32,
    runtime_mode: RuntimeMode,
    cors_origin: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_token_secret: SecretString, refresh_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            access_token_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            refresh_token_secret,
            refresh_token_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            reset_token_secret: None,
            reset_token_ttl_minutes: DEFAULT_RESET_TTL_MINUTES,
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
            login_rate_limit_window_seconds: DEFAULT_LOGIN_WINDOW_SECONDS,
            login_rate_limit_max: DEFAULT_LOGIN_MAX_ATTEMPTS,
            runtime_mode: RuntimeMode::Development,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_reset_token_secret(mut self, secret: SecretString) -> Self {
        self.reset_token_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.reset_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_minutes(mut self, minutes: i64) -> Self {
        self.otp_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_login_rate_limit(mut self, window_seconds: u64, max: u32) -> Self {
        self.login_rate_limit_window_seconds = window_seconds;
        self.login_rate_limit_max = max;
        self
    }

    #[must_use]
    pub fn with_runtime_mode(mut self, mode: RuntimeMode) -> Self {
        self.runtime_mode = mode;
        self
    }

    #[must_use]
    pub fn with_cors_origin(mut self, origin: String) -> Self {
        self.cors_origin = origin;
        self
    }

    #[must_use]
    pub fn access_token_secret(&self) -> &SecretString {
        &self.access_token_secret
    }

    #[must_use]
    pub fn refresh_token_secret(&self) -> &SecretString {
        &self.refresh_token_secret
    }

    /// Secret used for password-reset tokens.
    ///
    /// Falls back to the refresh secret when no dedicated secret is set; the
    /// server action logs that fallback at startup.
    #[must_use]
    pub fn reset_token_secret(&self) -> &SecretString {
        self.reset_token_secret
            .as_ref()
            .unwrap_or(&self.refresh_token_secret)
    }

    #[must_use]
    pub fn reset_secret_is_fallback(&self) -> bool {
        self.reset_token_secret.is_none()
    }

    #[must_use]
    pub fn access_token_ttl_minutes(&self) -> i64 {
        self.access_token_ttl_minutes
    }

    #[must_use]
    pub fn refresh_token_ttl_days(&self) -> i64 {
        self.refresh_token_ttl_days
    }

    #[must_use]
    pub fn reset_token_ttl_minutes(&self) -> i64 {
        self.reset_token_ttl_minutes
    }

    #[must_use]
    pub fn otp_ttl_minutes(&self) -> i64 {
        self.otp_ttl_minutes
    }

    #[must_use]
    pub fn login_rate_limit_window_seconds(&self) -> u64 {
        self.login_rate_limit_window_seconds
    }

    #[must_use]
    pub fn login_rate_limit_max(&self) -> u32 {
        self.login_rate_limit_max
    }

    #[must_use]
    pub fn runtime_mode(&self) -> RuntimeMode {
        self.runtime_mode
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.runtime_mode == RuntimeMode::Production
    }

    #[must_use]
    pub fn cors_origin(&self) -> &str {
        &self.cors_origin
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        rate_limiter: Arc<dyn RateLimiter>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            rate_limiter,
            mailer,
            clock,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(crate) fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::api::mail::{LogMailer, SmtpSettings};

    use super::super::rate_limit::NoopRateLimiter;

    /// Clock pinned to a fixed instant.
    pub(crate) struct FixedClock(pub i64);

    impl Clock for FixedClock {
        fn now_unix(&self) -> i64 {
            self.0
        }
    }

    pub(crate) fn test_config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("test-access-secret".to_string()),
            SecretString::from("test-refresh-secret".to_string()),
        )
    }

    pub(crate) fn test_state(now_unix: i64) -> AuthState {
        AuthState::new(
            test_config(),
            Arc::new(NoopRateLimiter),
            Arc::new(LogMailer::new(SmtpSettings::new(None, 587, None, None, None))),
            Arc::new(FixedClock(now_unix)),
        )
    }
}
