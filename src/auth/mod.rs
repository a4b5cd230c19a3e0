//! Credential primitives: password digests, access tokens, and the error
//! taxonomy shared by the session core and the HTTP layer.

mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use password::CredentialHasher;
pub use token::{AccessTokens, Claims, Principal};
