//! Mail delivery abstraction for password-reset codes.
//!
//! Handlers only see the `Mailer` trait; the default implementation logs the
//! dispatch instead of speaking SMTP so local development works without a
//! relay. `is_configured` is what the forgot-password flow consults before
//! deciding whether missing mail setup is fatal (production) or tolerable
//! (development, where the OTP is echoed in the response instead).

use anyhow::Result;
use secrecy::SecretString;
use tracing::info;

/// SMTP relay settings recognized from CLI/env.
#[derive(Debug)]
pub struct SmtpSettings {
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<SecretString>,
    from: Option<String>,
}

impl SmtpSettings {
    #[must_use]
    pub fn new(
        host: Option<String>,
        port: u16,
        username: Option<String>,
        password: Option<SecretString>,
        from: Option<String>,
    ) -> Self {
        Self {
            host,
            port,
            username,
            password,
            from,
        }
    }

    /// A relay host and a from-address are the minimum to deliver anything.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.from.is_some()
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> Option<&SecretString> {
        self.password.as_ref()
    }

    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }
}

/// Mail delivery abstraction used by the password-reset flow.
pub trait Mailer: Send + Sync {
    /// Whether the mailer has enough configuration to deliver anything.
    fn is_configured(&self) -> bool;

    /// Deliver a password-reset OTP or return an error.
    fn send_password_reset_otp(&self, to: &str, otp: &str, expires_in_minutes: i64) -> Result<()>;
}

/// Sender that logs the dispatch instead of sending real email.
pub struct LogMailer {
    settings: SmtpSettings,
}

impl LogMailer {
    #[must_use]
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }
}

impl Mailer for LogMailer {
    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn send_password_reset_otp(&self, to: &str, _otp: &str, expires_in_minutes: i64) -> Result<()> {
        // The code itself never reaches the logs.
        info!(
            to_email = %to,
            relay = self.settings.host().unwrap_or("none"),
            expires_in_minutes,
            "password reset OTP dispatch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_settings() -> SmtpSettings {
        SmtpSettings::new(
            Some("smtp.aula.dev".to_string()),
            587,
            Some("mailer".to_string()),
            Some(SecretString::from("hunter2".to_string())),
            Some("no-reply@aula.dev".to_string()),
        )
    }

    #[test]
    fn configured_requires_host_and_from() {
        assert!(full_settings().is_configured());

        let no_host = SmtpSettings::new(None, 587, None, None, Some("a@b.c".to_string()));
        assert!(!no_host.is_configured());

        let no_from = SmtpSettings::new(Some("smtp".to_string()), 587, None, None, None);
        assert!(!no_from.is_configured());
    }

    #[test]
    fn log_mailer_reports_settings_state() {
        let mailer = LogMailer::new(full_settings());
        assert!(mailer.is_configured());
        assert!(
            mailer
                .send_password_reset_otp("user@example.com", "123456", 10)
                .is_ok()
        );

        let bare = LogMailer::new(SmtpSettings::new(None, 587, None, None, None));
        assert!(!bare.is_configured());
    }
}
