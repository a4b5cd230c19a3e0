use crate::{
    api::{self, handlers::auth::AuthConfig},
    cli::commands::{auth, oauth},
    oauth::{OAuthConfig, ProviderConfig},
};
use anyhow::Result;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub auth: auth::Options,
    pub oauth: oauth::Options,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.auth.access_token_secret.clone())
            .with_access_token_ttl_minutes(self.auth.access_token_ttl_minutes)
            .with_refresh_token_ttl_days(self.auth.refresh_token_ttl_days)
            .with_environment(self.auth.environment.clone())
            .with_cookie_domain(self.auth.cookie_domain.clone())
            .with_frontend_base_url(self.auth.frontend_base_url.clone())
    }

    fn oauth_config(&self) -> OAuthConfig {
        let provider = ProviderConfig::new(
            self.oauth.client_id.clone(),
            self.oauth.client_secret.clone(),
            self.oauth.redirect_url.clone(),
        )
        .with_authorization_endpoint(self.oauth.authorization_endpoint.clone())
        .with_token_endpoint(self.oauth.token_endpoint.clone())
        .with_userinfo_endpoint(self.oauth.userinfo_endpoint.clone())
        .with_timeout(Duration::from_secs(self.oauth.timeout_seconds));

        OAuthConfig::new(provider)
            .with_state_ttl_seconds(self.oauth.state_ttl_seconds)
            .with_sweep_interval_seconds(self.oauth.sweep_interval_seconds)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config();
    let oauth_config = args.oauth_config();
    debug!(
        environment = auth_config.environment(),
        redirect_url = oauth_config.provider().redirect_url(),
        "starting server"
    );

    api::new(
        args.port,
        args.dsn,
        auth_config,
        oauth_config,
        Duration::from_secs(args.auth.request_timeout_seconds),
    )
    .await
}
