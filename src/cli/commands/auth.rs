use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_ACCESS_TOKEN_TTL_MINUTES: &str = "access-token-ttl-minutes";
pub const ARG_REFRESH_TOKEN_TTL_DAYS: &str = "refresh-token-ttl-days";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_COOKIE_DOMAIN: &str = "cookie-domain";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_REQUEST_TIMEOUT_SECONDS: &str = "request-timeout-seconds";

#[derive(Debug)]
pub struct Options {
    pub access_token_secret: SecretString,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub environment: String,
    pub cookie_domain: Option<String>,
    pub frontend_base_url: String,
    pub request_timeout_seconds: u64,
}

impl Options {
    /// Parse token, cookie and request arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the access-token secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let access_token_secret = matches
            .get_one::<String>(ARG_ACCESS_TOKEN_SECRET)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .map(SecretString::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_ACCESS_TOKEN_SECRET}"))?;

        Ok(Self {
            access_token_secret,
            access_token_ttl_minutes: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL_MINUTES)
                .copied()
                .unwrap_or(15),
            refresh_token_ttl_days: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL_DAYS)
                .copied()
                .unwrap_or(30),
            environment: matches
                .get_one::<String>(ARG_ENVIRONMENT)
                .cloned()
                .unwrap_or_else(|| "development".to_string()),
            cookie_domain: matches
                .get_one::<String>(ARG_COOKIE_DOMAIN)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            request_timeout_seconds: matches
                .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(15),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("HMAC secret used to sign access tokens")
                .env("STOREFRONT_ACCESS_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_MINUTES)
                .long(ARG_ACCESS_TOKEN_TTL_MINUTES)
                .help("Access token lifetime in minutes")
                .env("STOREFRONT_ACCESS_TOKEN_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_DAYS)
                .long(ARG_REFRESH_TOKEN_TTL_DAYS)
                .help("Session lifetime in days")
                .env("STOREFRONT_REFRESH_TOKEN_TTL_DAYS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment; cookies are Secure unless this is 'development'")
                .env("STOREFRONT_ENVIRONMENT")
                .default_value("development"),
        )
        .arg(
            Arg::new(ARG_COOKIE_DOMAIN)
                .long(ARG_COOKIE_DOMAIN)
                .help("Domain attribute for the session cookie")
                .env("STOREFRONT_COOKIE_DOMAIN"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Storefront URL allowed by CORS")
                .env("STOREFRONT_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_SECONDS)
                .long(ARG_REQUEST_TIMEOUT_SECONDS)
                .help("Per-request timeout in seconds")
                .env("STOREFRONT_REQUEST_TIMEOUT_SECONDS")
                .default_value("15")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_apply() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("STOREFRONT_ACCESS_TOKEN_SECRET", Some("s3cret")),
                ("STOREFRONT_ACCESS_TOKEN_TTL_MINUTES", None),
                ("STOREFRONT_REFRESH_TOKEN_TTL_DAYS", None),
                ("STOREFRONT_ENVIRONMENT", None),
                ("STOREFRONT_COOKIE_DOMAIN", None),
            ],
            || {
                let matches = with_args(Command::new("test")).try_get_matches_from(vec!["test"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.access_token_secret.expose_secret(), "s3cret");
                assert_eq!(options.access_token_ttl_minutes, 15);
                assert_eq!(options.refresh_token_ttl_days, 30);
                assert_eq!(options.environment, "development");
                assert_eq!(options.cookie_domain, None);
                assert_eq!(options.request_timeout_seconds, 15);
                Ok(())
            },
        )
    }

    #[test]
    fn zero_ttl_is_rejected() {
        temp_env::with_var("STOREFRONT_ACCESS_TOKEN_SECRET", Some("s3cret"), || {
            let result = with_args(Command::new("test"))
                .try_get_matches_from(vec!["test", "--access-token-ttl-minutes", "0"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn blank_secret_is_rejected() -> anyhow::Result<()> {
        temp_env::with_var("STOREFRONT_ACCESS_TOKEN_SECRET", Some("  "), || {
            let matches = with_args(Command::new("test")).try_get_matches_from(vec!["test"])?;
            let err = Options::parse(&matches).err().map(|err| err.to_string());
            assert_eq!(
                err.as_deref(),
                Some("missing required argument: --access-token-secret")
            );
            Ok(())
        })
    }
}
