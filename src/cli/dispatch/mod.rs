//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    // Secret separation check before anything touches the token config
    crate::cli::commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let access_token_secret = secret_arg(matches, "access-token-secret")
        .context("missing required argument: --access-token-secret")?;
    let refresh_token_secret = secret_arg(matches, "refresh-token-secret")
        .context("missing required argument: --refresh-token-secret")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        access_token_secret,
        access_token_ttl_minutes: copied_i64(matches, "access-token-ttl-minutes", 15),
        refresh_token_secret,
        refresh_token_ttl_days: copied_i64(matches, "refresh-token-ttl-days", 7),
        reset_token_secret: secret_arg(matches, "reset-token-secret"),
        reset_token_ttl_minutes: copied_i64(matches, "reset-token-ttl-minutes", 10),
        otp_ttl_minutes: copied_i64(matches, "otp-ttl-minutes", 10),
        login_rate_limit_window_seconds: matches
            .get_one::<u64>("login-rate-limit-window-seconds")
            .copied()
            .unwrap_or(60),
        login_rate_limit_max: matches
            .get_one::<u32>("login-rate-limit-max")
            .copied()
            .unwrap_or(5),
        runtime_mode: matches
            .get_one::<String>("runtime-mode")
            .cloned()
            .unwrap_or_else(|| "development".to_string()),
        cors_origin: matches
            .get_one::<String>("cors-origin")
            .cloned()
            .unwrap_or_else(|| "https://app.aula.dev".to_string()),
        smtp_host: matches.get_one::<String>("smtp-host").cloned(),
        smtp_port: matches.get_one::<u16>("smtp-port").copied().unwrap_or(587),
        smtp_username: matches.get_one::<String>("smtp-username").cloned(),
        smtp_password: secret_arg(matches, "smtp-password"),
        smtp_from: matches.get_one::<String>("smtp-from").cloned(),
    }))
}

fn secret_arg(matches: &clap::ArgMatches, name: &str) -> Option<SecretString> {
    matches
        .get_one::<String>(name)
        .map(|value| SecretString::from(value.clone()))
}

fn copied_i64(matches: &clap::ArgMatches, name: &str, default: i64) -> i64 {
    matches.get_one::<i64>(name).copied().unwrap_or(default)
}
