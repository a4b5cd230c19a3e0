use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::oauth::provider::{
    GOOGLE_AUTHORIZATION_ENDPOINT, GOOGLE_TOKEN_ENDPOINT, GOOGLE_USERINFO_ENDPOINT,
};

pub const ARG_CLIENT_ID: &str = "google-client-id";
pub const ARG_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_REDIRECT_URL: &str = "google-redirect-url";
pub const ARG_AUTHORIZATION_ENDPOINT: &str = "oauth-authorization-endpoint";
pub const ARG_TOKEN_ENDPOINT: &str = "oauth-token-endpoint";
pub const ARG_USERINFO_ENDPOINT: &str = "oauth-userinfo-endpoint";
pub const ARG_STATE_TTL_SECONDS: &str = "oauth-state-ttl-seconds";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "oauth-sweep-interval-seconds";
pub const ARG_TIMEOUT_SECONDS: &str = "oauth-timeout-seconds";

#[derive(Debug)]
pub struct Options {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_url: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub state_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse OAuth provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let read_u64 = |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);

        Ok(Self {
            client_id: read_required(ARG_CLIENT_ID)?,
            client_secret: SecretString::from(read_required(ARG_CLIENT_SECRET)?),
            redirect_url: read_required(ARG_REDIRECT_URL)?,
            authorization_endpoint: read_required(ARG_AUTHORIZATION_ENDPOINT)?,
            token_endpoint: read_required(ARG_TOKEN_ENDPOINT)?,
            userinfo_endpoint: read_required(ARG_USERINFO_ENDPOINT)?,
            state_ttl_seconds: read_u64(ARG_STATE_TTL_SECONDS, 600),
            sweep_interval_seconds: read_u64(ARG_SWEEP_INTERVAL_SECONDS, 60),
            timeout_seconds: read_u64(ARG_TIMEOUT_SECONDS, 10),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("OAuth client id issued by Google")
                .env("STOREFRONT_GOOGLE_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_SECRET)
                .long(ARG_CLIENT_SECRET)
                .help("OAuth client secret issued by Google")
                .env("STOREFRONT_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REDIRECT_URL)
                .long(ARG_REDIRECT_URL)
                .help("Callback URL registered with the provider")
                .env("STOREFRONT_GOOGLE_REDIRECT_URL")
                .default_value("http://localhost:8080/auth/google/callback"),
        );
    with_endpoint_args(command)
}

fn with_endpoint_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTHORIZATION_ENDPOINT)
                .long(ARG_AUTHORIZATION_ENDPOINT)
                .help("Provider authorization endpoint")
                .env("STOREFRONT_OAUTH_AUTHORIZATION_ENDPOINT")
                .default_value(GOOGLE_AUTHORIZATION_ENDPOINT),
        )
        .arg(
            Arg::new(ARG_TOKEN_ENDPOINT)
                .long(ARG_TOKEN_ENDPOINT)
                .help("Provider token endpoint")
                .env("STOREFRONT_OAUTH_TOKEN_ENDPOINT")
                .default_value(GOOGLE_TOKEN_ENDPOINT),
        )
        .arg(
            Arg::new(ARG_USERINFO_ENDPOINT)
                .long(ARG_USERINFO_ENDPOINT)
                .help("Provider userinfo endpoint")
                .env("STOREFRONT_OAUTH_USERINFO_ENDPOINT")
                .default_value(GOOGLE_USERINFO_ENDPOINT),
        )
        .arg(
            Arg::new(ARG_STATE_TTL_SECONDS)
                .long(ARG_STATE_TTL_SECONDS)
                .help("Lifetime of a pending login's state and verifier")
                .env("STOREFRONT_OAUTH_STATE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("How often expired login states are purged")
                .env("STOREFRONT_OAUTH_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_TIMEOUT_SECONDS)
                .long(ARG_TIMEOUT_SECONDS)
                .help("Timeout for calls to the provider")
                .env("STOREFRONT_OAUTH_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
