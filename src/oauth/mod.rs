//! Third-party login: OAuth authorization-code flow with PKCE.

mod config;
pub mod exchange;
pub mod pkce;
pub mod provider;

pub use config::OAuthConfig;
pub use exchange::ExternalIdentityExchange;
pub use pkce::{PkceCache, PkceChallenge, PkceJanitor};
pub use provider::{ExternalProfile, IdentityProvider, OidcProvider, ProviderConfig};
