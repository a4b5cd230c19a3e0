//! OpenID Connect client for the authorization-code flow with PKCE.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::APP_USER_AGENT;

pub const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: &str = "openid email profile";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Identity asserted by the provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

/// The two network legs of the authorization-code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the flow.
    fn authorization_url(&self, state: &str, challenge: &str) -> Url;

    /// Redeem `code` with the PKCE `verifier`; returns the provider access token.
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<String>;

    /// Fetch the caller's profile with a provider access token.
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile>;
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    timeout: Duration,
}

impl ProviderConfig {
    /// Google endpoints and a 10 second timeout by default.
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, redirect_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
            authorization_endpoint: GOOGLE_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: GOOGLE_USERINFO_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_authorization_endpoint(mut self, endpoint: String) -> Self {
        self.authorization_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: String) -> Self {
        self.token_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_userinfo_endpoint(mut self, endpoint: String) -> Self {
        self.userinfo_endpoint = endpoint;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

pub struct OidcProvider {
    config: ProviderConfig,
    authorization_endpoint: Url,
    client: Client,
}

impl OidcProvider {
    /// # Errors
    /// Returns an error if the authorization endpoint is not a valid URL or
    /// the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let authorization_endpoint = Url::parse(&config.authorization_endpoint)
            .with_context(|| format!("invalid authorization endpoint: {}", config.authorization_endpoint))?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .context("failed to build identity provider client")?;
        Ok(Self {
            config,
            authorization_endpoint,
            client,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_url(&self, state: &str, challenge: &str) -> Url {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline");
        url
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<String> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .context("token endpoint unreachable")?;

        let status = response.status();
        if !status.is_success() {
            bail!("token endpoint returned {status}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("token endpoint returned an unparsable body")?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile> {
        let response = self
            .client
            .get(&self.config.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .context("userinfo endpoint unreachable")?;

        let status = response.status();
        if !status.is_success() {
            bail!("userinfo endpoint returned {status}");
        }

        let info: UserInfo = response
            .json()
            .await
            .context("userinfo endpoint returned an unparsable body")?;
        if info.sub.trim().is_empty() {
            bail!("userinfo response has an empty subject");
        }
        Ok(ExternalProfile {
            subject: info.sub,
            email: info.email,
            email_verified: info.email_verified.unwrap_or(false),
            name: info.name,
        })
    }
}
