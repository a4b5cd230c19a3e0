//! Argon2id password digests.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::{Arc, OnceLock};

const DUMMY_PASSWORD: &str = "storefront-auth-dummy-password";

/// Hashes and verifies passwords as PHC strings with a random salt per digest.
#[derive(Clone, Debug)]
pub struct CredentialHasher {
    params: Params,
    dummy: Arc<OnceLock<String>>,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
            dummy: Arc::new(OnceLock::new()),
        }
    }
}

impl CredentialHasher {
    /// Hasher with explicit Argon2 costs (memory in KiB, iterations, lanes).
    ///
    /// # Errors
    /// Returns an error if the parameters are outside Argon2's accepted range.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self {
            params,
            dummy: Arc::new(OnceLock::new()),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Produce a digest for `plaintext`.
    ///
    /// # Errors
    /// Returns an error if Argon2 fails to hash, which only happens on resource
    /// exhaustion or invalid parameters.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?;
        Ok(digest.to_string())
    }

    /// Check `plaintext` against `digest`. Malformed digests never match.
    #[must_use]
    pub fn verify(&self, digest: &str, plaintext: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Run one verification that always fails, costing the same as a real one.
    ///
    /// Used when the account does not exist so that both login failure paths
    /// take comparable time.
    pub fn verify_dummy(&self, plaintext: &str) {
        let digest = self
            .dummy
            .get_or_init(|| self.hash(DUMMY_PASSWORD).unwrap_or_default());
        let _ = self.verify(digest, plaintext);
    }
}
