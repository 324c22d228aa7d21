use clap::{Arg, Command};

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_REFRESH_TOKEN_SECRET: &str = "refresh-token-secret";
pub const ARG_RESET_TOKEN_SECRET: &str = "reset-token-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_otp_args(command);
    let command = with_rate_limit_args(command);
    with_runtime_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("HS256 secret for access tokens")
                .env("AULA_ACCESS_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("access-token-ttl-minutes")
                .long("access-token-ttl-minutes")
                .help("Access token TTL in minutes")
                .env("AULA_ACCESS_TOKEN_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_SECRET)
                .long(ARG_REFRESH_TOKEN_SECRET)
                .help("HS256 secret for refresh tokens")
                .env("AULA_REFRESH_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("refresh-token-ttl-days")
                .long("refresh-token-ttl-days")
                .help("Refresh token TTL in days")
                .env("AULA_REFRESH_TOKEN_TTL_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_SECRET)
                .long(ARG_RESET_TOKEN_SECRET)
                .help("HS256 secret for password-reset tokens (falls back to the refresh secret)")
                .env("AULA_RESET_TOKEN_SECRET"),
        )
        .arg(
            Arg::new("reset-token-ttl-minutes")
                .long("reset-token-ttl-minutes")
                .help("Password-reset token TTL in minutes")
                .env("AULA_RESET_TOKEN_TTL_MINUTES")
                .default_value("10")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_otp_args(command: Command) -> Command {
    command.arg(
        Arg::new("otp-ttl-minutes")
            .long("otp-ttl-minutes")
            .help("Password-reset OTP TTL in minutes")
            .env("AULA_OTP_TTL_MINUTES")
            .default_value("10")
            .value_parser(clap::value_parser!(i64)),
    )
}

fn with_rate_limit_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("login-rate-limit-window-seconds")
                .long("login-rate-limit-window-seconds")
                .help("Fixed window size for login rate limiting")
                .env("AULA_LOGIN_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("login-rate-limit-max")
                .long("login-rate-limit-max")
                .help("Max login attempts per window per IP/email")
                .env("AULA_LOGIN_RATE_LIMIT_MAX")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn with_runtime_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("runtime-mode")
                .long("runtime-mode")
                .help("Runtime mode; production makes missing mail config fatal and never echoes OTPs")
                .env("AULA_RUNTIME_MODE")
                .default_value("development")
                .value_parser(["development", "production"]),
        )
        .arg(
            Arg::new("cors-origin")
                .long("cors-origin")
                .help("Frontend origin allowed by CORS")
                .env("AULA_CORS_ORIGIN")
                .default_value("https://app.aula.dev"),
        )
}
