//! Short-lived HS256 access tokens.

use super::AuthError;
use anyhow::Context;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::accounts::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller recovered from a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: AccountId,
    pub role: String,
}

/// Issues and validates access tokens with a shared HMAC secret.
///
/// Tokens are not stored anywhere; a token stays valid until `exp` no matter
/// what happens to the session it was minted from.
#[derive(Clone)]
pub struct AccessTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AccessTokens {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `account_id` with `role`, valid for the configured TTL.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue(&self, account_id: AccountId, role: &str) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: account_id.to_string(),
            role: role.to_string(),
            iat,
            exp: iat + self.ttl.num_seconds(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign access token")?;
        Ok(token)
    }

    /// Verify signature and expiry, then return the caller.
    ///
    /// # Errors
    /// `TokenExpired` once `now >= exp`; `InvalidToken` for anything else that
    /// does not check out, including an empty role or a non-numeric subject.
    pub fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;
        let claims = data.claims;

        if Utc::now().timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }
        if claims.role.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let account_id = claims
            .sub
            .parse::<AccountId>()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(Principal {
            account_id,
            role: claims.role,
        })
    }
}
