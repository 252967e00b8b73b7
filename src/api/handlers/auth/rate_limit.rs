//! Rate limiting primitives for auth flows.
//!
//! Budgets are per route class, keyed by client IP and, where the
//! request names one, the target account. Actions in the same class
//! spend one shared budget per key, so alternating between register and
//! forgot-password does not multiply the allowance.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub enum RateLimitAction {
    Register,
    Login,
    VerifyEmail,
    ResendVerification,
    ForgotPassword,
    VerifyOtp,
    ResetPassword,
}

impl RateLimitAction {
    /// Budget class. Secret-minting actions share the strict budget;
    /// secret-checking actions share the verify budget.
    fn class(self) -> &'static str {
        match self {
            Self::Register | Self::ResendVerification | Self::ForgotPassword => "strict",
            Self::Login => "login",
            Self::VerifyEmail | Self::VerifyOtp => "verify",
            Self::ResetPassword => "reset",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

pub trait RateLimiter: Send + Sync {
    fn check(
        &self,
        action: RateLimitAction,
        ip: Option<&str>,
        account: Option<&str>,
    ) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(
        &self,
        _action: RateLimitAction,
        _ip: Option<&str>,
        _account: Option<&str>,
    ) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Budget {
    max_requests: u32,
    window: Duration,
}

impl Budget {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    strict: Budget,
    login: Budget,
    verify: Budget,
    reset: Budget,
}

impl RateLimitConfig {
    /// Defaults: 5 secret-minting requests and 5 resets per 15 minutes,
    /// 10 logins and 10 secret checks per 5 minutes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strict: Budget::new(5, Duration::from_secs(15 * 60)),
            login: Budget::new(10, Duration::from_secs(5 * 60)),
            verify: Budget::new(10, Duration::from_secs(5 * 60)),
            reset: Budget::new(5, Duration::from_secs(15 * 60)),
        }
    }

    #[must_use]
    pub fn with_strict(mut self, budget: Budget) -> Self {
        self.strict = budget;
        self
    }

    #[must_use]
    pub fn with_login(mut self, budget: Budget) -> Self {
        self.login = budget;
        self
    }

    #[must_use]
    pub fn with_verify(mut self, budget: Budget) -> Self {
        self.verify = budget;
        self
    }

    #[must_use]
    pub fn with_reset(mut self, budget: Budget) -> Self {
        self.reset = budget;
        self
    }

    fn budget(&self, action: RateLimitAction) -> Budget {
        match action.class() {
            "strict" => self.strict,
            "login" => self.login,
            "verify" => self.verify,
            _ => self.reset,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per (class, ip, account) key.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

// Expired windows are swept once this many keys are tracked.
const MAX_TRACKED_KEYS: usize = 10_000;

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(
        &self,
        action: RateLimitAction,
        ip: Option<&str>,
        account: Option<&str>,
    ) -> RateLimitDecision {
        let budget = self.config.budget(action);
        let key = format!(
            "{}:{}:{}",
            action.class(),
            ip.unwrap_or("-"),
            account.unwrap_or("-")
        );
        let now = Instant::now();

        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= MAX_TRACKED_KEYS {
            let horizon = budget.window;
            windows.retain(|_, window| now.duration_since(window.started) < horizon);
        }

        let window = windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= budget.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= budget.max_requests {
            let elapsed = now.duration_since(window.started);
            let remaining = budget.window.saturating_sub(elapsed);
            return RateLimitDecision::Limited {
                retry_after_seconds: remaining.as_secs().max(1),
            };
        }
        window.count += 1;
        RateLimitDecision::Allowed
    }
}
