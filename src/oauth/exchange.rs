use anyhow::anyhow;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{instrument, warn};
use url::Url;

use super::pkce::{PkceCache, PkceChallenge};
use super::provider::{ExternalProfile, IdentityProvider};
use crate::auth::AuthError;

/// Drives the authorization-code handshake: PKCE bookkeeping on our side,
/// token exchange and profile fetch on the provider's.
#[derive(Clone)]
pub struct ExternalIdentityExchange {
    pkce: Arc<PkceCache>,
    provider: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl ExternalIdentityExchange {
    #[must_use]
    pub fn new(pkce: Arc<PkceCache>, provider: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self {
            pkce,
            provider,
            timeout,
        }
    }

    #[must_use]
    pub fn authorization_url(&self, state: &str, challenge: &str) -> Url {
        self.provider.authorization_url(state, challenge)
    }

    /// Register a new PKCE entry and build the URL to redirect the browser to.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if random generation fails.
    pub async fn start(&self) -> Result<(PkceChallenge, Url), AuthError> {
        let pkce = self.pkce.begin().await?;
        let url = self.authorization_url(&pkce.state, &pkce.challenge);
        Ok((pkce, url))
    }

    /// Redeem the provider callback.
    ///
    /// # Errors
    /// - `StateMismatch` when `state` is unknown, expired or already used; the
    ///   provider is not contacted.
    /// - `Exchange` when the token exchange fails or times out.
    /// - `Profile` when the profile fetch fails or times out.
    #[instrument(skip_all)]
    pub async fn callback(&self, code: &str, state: &str) -> Result<ExternalProfile, AuthError> {
        let Some(verifier) = self.pkce.consume(state).await else {
            warn!("oauth callback with unknown or expired state");
            return Err(AuthError::StateMismatch);
        };

        let access_token = self
            .bounded(self.provider.exchange_code(code, &verifier))
            .await
            .map_err(|err| {
                warn!("oauth token exchange failed: {err:#}");
                AuthError::Exchange(err)
            })?;

        self.bounded(self.provider.fetch_profile(&access_token))
            .await
            .map_err(|err| {
                warn!("oauth profile fetch failed: {err:#}");
                AuthError::Profile(err)
            })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("identity provider did not answer within {:?}", self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::pkce::DEFAULT_STATE_TTL;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeProvider {
        exchanges: AtomicUsize,
        fail_exchange: bool,
        fail_profile: bool,
        hang: bool,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorization_url(&self, state: &str, challenge: &str) -> Url {
            let mut url = Url::parse("https://idp.test/authorize").expect("static url");
            url.query_pairs_mut()
                .append_pair("state", state)
                .append_pair("code_challenge", challenge);
            url
        }

        async fn exchange_code(&self, code: &str, verifier: &str) -> anyhow::Result<String> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail_exchange {
                return Err(anyhow!("token endpoint returned 500"));
            }
            Ok(format!("{code}:{verifier}"))
        }

        async fn fetch_profile(&self, _access_token: &str) -> anyhow::Result<ExternalProfile> {
            if self.fail_profile {
                return Err(anyhow!("userinfo endpoint returned 401"));
            }
            Ok(ExternalProfile {
                subject: "sub-1".to_string(),
                email: Some("ada@example.com".to_string()),
                email_verified: true,
                name: Some("Ada".to_string()),
            })
        }
    }

    fn exchange(provider: Arc<FakeProvider>) -> ExternalIdentityExchange {
        ExternalIdentityExchange::new(
            Arc::new(PkceCache::new(DEFAULT_STATE_TTL)),
            provider,
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn start_then_callback_returns_profile() -> Result<(), AuthError> {
        let provider = Arc::new(FakeProvider::default());
        let exchange = exchange(provider.clone());
        let (pkce, url) = exchange.start().await?;
        assert!(url.as_str().contains(&pkce.challenge));

        let profile = exchange.callback("code", &pkce.state).await?;
        assert_eq!(profile.subject, "sub-1");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_state_never_reaches_provider() {
        let provider = Arc::new(FakeProvider::default());
        let exchange = exchange(provider.clone());
        let result = exchange.callback("code", "forged-state").await;
        assert!(matches!(result, Err(AuthError::StateMismatch)));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn replayed_state_is_rejected() -> Result<(), AuthError> {
        let provider = Arc::new(FakeProvider::default());
        let exchange = exchange(provider.clone());
        let (pkce, _) = exchange.start().await?;
        exchange.callback("code", &pkce.state).await?;
        let replay = exchange.callback("code", &pkce.state).await;
        assert!(matches!(replay, Err(AuthError::StateMismatch)));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_exchange_is_reported() -> Result<(), AuthError> {
        let exchange = exchange(Arc::new(FakeProvider {
            fail_exchange: true,
            ..FakeProvider::default()
        }));
        let (pkce, _) = exchange.start().await?;
        let result = exchange.callback("code", &pkce.state).await;
        assert!(matches!(result, Err(AuthError::Exchange(_))));
        Ok(())
    }

    #[tokio::test]
    async fn failed_profile_is_reported() -> Result<(), AuthError> {
        let exchange = exchange(Arc::new(FakeProvider {
            fail_profile: true,
            ..FakeProvider::default()
        }));
        let (pkce, _) = exchange.start().await?;
        let result = exchange.callback("code", &pkce.state).await;
        assert!(matches!(result, Err(AuthError::Profile(_))));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_times_out() -> Result<(), AuthError> {
        let exchange = exchange(Arc::new(FakeProvider {
            hang: true,
            ..FakeProvider::default()
        }));
        let (pkce, _) = exchange.start().await?;
        let result = exchange.callback("code", &pkce.state).await;
        assert!(matches!(result, Err(AuthError::Exchange(_))));
        Ok(())
    }
}
