//! Rate limiting primitives for auth flows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub enum RateLimitAction {
    Login,
    VerifyOtp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn check_email(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Fixed-window in-memory limiter keyed by `{action}:{scope}`.
///
/// Counts reset when a window elapses; stale windows are pruned on every
/// check so the map stays bounded by active callers.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    window: Duration,
    max_attempts: u32,
    hits: Mutex<HashMap<String, (Instant, u32)>>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(window_seconds: u64, max_attempts: u32) -> Self {
        Self {
            window: Duration::from_secs(window_seconds.max(1)),
            max_attempts: max_attempts.max(1),
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn check(&self, key: String) -> RateLimitDecision {
        let now = Instant::now();
        let Ok(mut hits) = self.hits.lock() else {
            // A poisoned lock fails open; availability over strictness here.
            return RateLimitDecision::Allowed;
        };
        hits.retain(|_, (window_start, _)| now.duration_since(*window_start) < self.window);

        let entry = hits.entry(key).or_insert((now, 0));
        if entry.1 >= self.max_attempts {
            return RateLimitDecision::Limited;
        }
        entry.1 += 1;
        RateLimitDecision::Allowed
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        // Requests without a resolvable IP share one bucket.
        let scope = ip.unwrap_or("unknown");
        self.check(format!("{action:?}:ip:{scope}"))
    }

    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision {
        self.check(format!("{action:?}:email:{email}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_email("user@example.com", RateLimitAction::VerifyOtp),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn fixed_window_limits_after_max() {
        let limiter = FixedWindowRateLimiter::new(3600, 3);
        for _ in 0..3 {
            assert_eq!(
                limiter.check_email("user@example.com", RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check_email("user@example.com", RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn scopes_are_independent() {
        let limiter = FixedWindowRateLimiter::new(3600, 1);
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        // Different email, different bucket.
        assert_eq!(
            limiter.check_email("b@example.com", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        // Same email, different action, different bucket.
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::VerifyOtp),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn missing_ip_shares_a_bucket() {
        let limiter = FixedWindowRateLimiter::new(3600, 1);
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Login),
            RateLimitDecision::Limited
        );
        assert_eq!(
            limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }
}
