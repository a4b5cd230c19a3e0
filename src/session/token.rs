//! Refresh credentials.
//!
//! The raw token only ever travels in the session cookie. Storage keeps its
//! SHA-256, and everything that is shown to users or written to logs uses the
//! session's public [`SessionId`](super::SessionId) instead.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;
// 32 bytes encode to 43 unpadded base64url characters.
const TOKEN_LEN: usize = 43;

/// Create a new refresh token for the session cookie.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a refresh token so raw values never touch the store.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

/// Cheap shape check before hitting the store.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() -> Result<()> {
        let a = generate_session_token()?;
        let b = generate_session_token()?;
        assert!(is_well_formed(&a));
        assert!(is_well_formed(&b));
        assert_ne!(a, b);
        Ok(())
    }

    #[test]
    fn hash_is_sha256_of_the_token() {
        let digest = hash_session_token("abc");
        assert_eq!(digest.len(), 32);
        assert_eq!(digest, hash_session_token("abc"));
        assert_ne!(digest, hash_session_token("abd"));
    }

    #[test]
    fn uuids_and_garbage_are_not_tokens() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("not-a-session"));
        assert!(!is_well_formed("3f2b8f0e-6a8e-4d7b-9f63-0a3c2a9f1e11"));
        assert!(!is_well_formed(&"%".repeat(TOKEN_LEN)));
    }
}
