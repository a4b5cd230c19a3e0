//! Auth configuration and the shared state handed to every handler.

use secrecy::SecretString;

use crate::oauth::ExternalIdentityExchange;
use crate::session::SessionService;

const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:3000";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_secret: SecretString,
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
    environment: String,
    cookie_domain: Option<String>,
    frontend_base_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            cookie_domain: None,
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub const fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: String) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_cookie_domain(mut self, domain: Option<String>) -> Self {
        self.cookie_domain = domain.filter(|d| !d.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: String) -> Self {
        self.frontend_base_url = url;
        self
    }

    #[must_use]
    pub const fn access_token_secret(&self) -> &SecretString {
        &self.access_token_secret
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days)
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    #[must_use]
    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie_domain.as_deref()
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Cookies are marked `Secure` everywhere except local development.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.environment != DEFAULT_ENVIRONMENT
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: SessionService,
    exchange: ExternalIdentityExchange,
}

impl AuthState {
    #[must_use]
    pub const fn new(
        config: AuthConfig,
        sessions: SessionService,
        exchange: ExternalIdentityExchange,
    ) -> Self {
        Self {
            config,
            sessions,
            exchange,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    #[must_use]
    pub const fn exchange(&self) -> &ExternalIdentityExchange {
        &self.exchange
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AuthConfig::new(SecretString::from("s"));
        assert_eq!(config.access_token_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.refresh_token_ttl(), chrono::Duration::days(30));
        assert_eq!(config.environment(), "development");
        assert!(!config.session_cookie_secure());
        assert_eq!(config.cookie_domain(), None);
    }

    #[test]
    fn non_development_environments_use_secure_cookies() {
        let config = AuthConfig::new(SecretString::from("s"))
            .with_environment("production".to_string())
            .with_cookie_domain(Some("shop.example".to_string()));
        assert!(config.session_cookie_secure());
        assert_eq!(config.cookie_domain(), Some("shop.example"));
    }

    #[test]
    fn blank_cookie_domain_is_ignored() {
        let config = AuthConfig::new(SecretString::from("s")).with_cookie_domain(Some("  ".to_string()));
        assert_eq!(config.cookie_domain(), None);
    }
}
