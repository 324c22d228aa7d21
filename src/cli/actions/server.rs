use crate::api::{
    self,
    handlers::auth::{AuthConfig, AuthState, FixedWindowRateLimiter, RuntimeMode, SystemClock},
    mail::{LogMailer, SmtpSettings},
};
use anyhow::{Result, anyhow};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_token_secret: SecretString,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_secret: SecretString,
    pub refresh_token_ttl_days: i64,
    pub reset_token_secret: Option<SecretString>,
    pub reset_token_ttl_minutes: i64,
    pub otp_ttl_minutes: i64,
    pub login_rate_limit_window_seconds: u64,
    pub login_rate_limit_max: u32,
    pub runtime_mode: String,
    pub cors_origin: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_from: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is inconsistent or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let runtime_mode = RuntimeMode::parse(&args.runtime_mode)
        .ok_or_else(|| anyhow!("Invalid runtime mode: {}", args.runtime_mode))?;

    let mut auth_config = AuthConfig::new(args.access_token_secret, args.refresh_token_secret)
        .with_access_token_ttl_minutes(args.access_token_ttl_minutes)
        .with_refresh_token_ttl_days(args.refresh_token_ttl_days)
        .with_reset_token_ttl_minutes(args.reset_token_ttl_minutes)
        .with_otp_ttl_minutes(args.otp_ttl_minutes)
        .with_login_rate_limit(args.login_rate_limit_window_seconds, args.login_rate_limit_max)
        .with_runtime_mode(runtime_mode)
        .with_cors_origin(args.cors_origin);

    if let Some(secret) = args.reset_token_secret {
        auth_config = auth_config.with_reset_token_secret(secret);
    } else {
        // Reusing the refresh secret weakens key separation between two
        // unrelated token kinds; supported, but called out loudly.
        warn!(
            "No dedicated password-reset token secret configured; \
             falling back to the refresh-token secret"
        );
    }

    let smtp = SmtpSettings::new(
        args.smtp_host,
        args.smtp_port,
        args.smtp_username,
        args.smtp_password,
        args.smtp_from,
    );
    if !smtp.is_configured() && runtime_mode == RuntimeMode::Production {
        warn!("SMTP is not configured; password-reset requests will fail in production");
    }

    let rate_limiter = FixedWindowRateLimiter::new(
        auth_config.login_rate_limit_window_seconds(),
        auth_config.login_rate_limit_max(),
    );

    let auth_state = Arc::new(AuthState::new(
        auth_config,
        Arc::new(rate_limiter),
        Arc::new(LogMailer::new(smtp)),
        Arc::new(SystemClock),
    ));

    api::serve(args.port, args.dsn, auth_state).await
}
