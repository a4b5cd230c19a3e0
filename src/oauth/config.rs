use std::time::Duration;

use super::pkce::{DEFAULT_STATE_TTL, DEFAULT_SWEEP_INTERVAL};
use super::provider::ProviderConfig;

/// Provider settings plus the PKCE cache lifetimes.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    provider: ProviderConfig,
    state_ttl: Duration,
    sweep_interval: Duration,
}

impl OAuthConfig {
    #[must_use]
    pub const fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            state_ttl: DEFAULT_STATE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_state_ttl_seconds(mut self, seconds: u64) -> Self {
        self.state_ttl = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub const fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub const fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    #[must_use]
    pub const fn state_ttl(&self) -> Duration {
        self.state_ttl
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn provider() -> ProviderConfig {
        ProviderConfig::new(
            "client".to_string(),
            SecretString::from("secret"),
            "http://localhost:8080/auth/google/callback".to_string(),
        )
    }

    #[test]
    fn defaults() {
        let config = OAuthConfig::new(provider());
        assert_eq!(config.state_ttl(), Duration::from_secs(600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.provider().timeout(), Duration::from_secs(10));
    }

    #[test]
    fn overrides() {
        let config = OAuthConfig::new(provider())
            .with_state_ttl_seconds(30)
            .with_sweep_interval_seconds(5);
        assert_eq!(config.state_ttl(), Duration::from_secs(30));
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
    }
}
