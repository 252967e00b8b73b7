//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;

use super::rate_limit::RateLimiter;
use super::service::AccountService;
use crate::notify::Notifier;
use crate::store::AccountStore;

const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    jwt_secret: SecretString,
    session_ttl_days: i64,
    production: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String, jwt_secret: SecretString) -> Self {
        // Verification links are built by joining paths onto this.
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            jwt_secret,
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
            production: false,
        }
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_days * 24 * 60 * 60
    }

    #[must_use]
    pub fn production(&self) -> bool {
        self.production
    }

    /// Session cookies carry `Secure` only in production deployments.
    pub(super) fn session_cookie_secure(&self) -> bool {
        self.production
    }
}

pub struct AuthState {
    service: AccountService,
    rate_limiter: Arc<dyn RateLimiter>,
    config: AuthConfig,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let service = AccountService::new(store, notifier, &config);
        Self {
            service,
            rate_limiter,
            config,
        }
    }

    #[must_use]
    pub fn service(&self) -> &AccountService {
        &self.service
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(
            "https://bookshelf.dev/".to_string(),
            SecretString::from("secret"),
        );
        assert_eq!(config.base_url(), "https://bookshelf.dev");
        assert_eq!(config.session_ttl_seconds(), 7 * 24 * 60 * 60);
        assert!(!config.session_cookie_secure());

        let config = config.with_session_ttl_days(1).with_production(true);
        assert_eq!(config.session_ttl_seconds(), 24 * 60 * 60);
        assert!(config.session_cookie_secure());
    }
}
