//! One-time PKCE challenges keyed by the OAuth `state` parameter.
//!
//! Entries are process-local. A restart drops every pending login, which only
//! means those users have to click "sign in" again.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use tracing::debug;

const STATE_BYTES: usize = 32;
// 64 bytes encode to 86 characters, inside the 43..=128 range PKCE allows.
const VERIFIER_BYTES: usize = 64;

pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Values produced when a login starts. Only `verifier` stays server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub state: String,
    pub verifier: String,
    pub challenge: String,
}

struct Entry {
    verifier: String,
    expires_at: Instant,
}

pub struct PkceCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl PkceCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a fresh state/verifier pair and remember it for the TTL.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub async fn begin(&self) -> Result<PkceChallenge> {
        let state = random_url_safe(STATE_BYTES).context("failed to generate oauth state")?;
        let verifier = random_url_safe(VERIFIER_BYTES).context("failed to generate pkce verifier")?;
        let challenge = challenge_for(&verifier);

        let mut entries = self.entries.lock().await;
        entries.insert(
            state.clone(),
            Entry {
                verifier: verifier.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        Ok(PkceChallenge {
            state,
            verifier,
            challenge,
        })
    }

    /// Remove the entry for `state` and return its verifier if it had not
    /// expired. A second call for the same state always returns `None`.
    pub async fn consume(&self, state: &str) -> Option<String> {
        let entry = self.entries.lock().await.remove(state)?;
        (Instant::now() < entry.expires_at).then_some(entry.verifier)
    }

    /// Drop every expired entry; returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start the periodic sweeper. It runs until the returned handle is shut
    /// down or dropped.
    #[must_use]
    pub fn spawn_janitor(self: &Arc<Self>, interval: Duration) -> PkceJanitor {
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept expired pkce entries");
                }
            }
        });
        PkceJanitor {
            handle: Some(handle),
        }
    }
}

/// Owner of the sweeper task.
pub struct PkceJanitor {
    handle: Option<JoinHandle<()>>,
}

impl PkceJanitor {
    /// Stop the sweeper and wait for it to wind down.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PkceJanitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// `base64url(sha256(verifier))`, the S256 transform.
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&digest)
}

fn random_url_safe(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn begin_produces_matching_challenge() -> Result<()> {
        let cache = PkceCache::new(DEFAULT_STATE_TTL);
        let pkce = cache.begin().await?;

        assert_eq!(pkce.state.len(), 43);
        assert_eq!(pkce.verifier.len(), 86);
        assert_eq!(pkce.challenge, challenge_for(&pkce.verifier));
        assert!(pkce
            .verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[test]
    fn challenge_matches_rfc7636_example() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[tokio::test]
    async fn consume_is_single_use() -> Result<()> {
        let cache = PkceCache::new(DEFAULT_STATE_TTL);
        let pkce = cache.begin().await?;

        assert_eq!(cache.consume(&pkce.state).await, Some(pkce.verifier));
        assert_eq!(cache.consume(&pkce.state).await, None);
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_state_yields_none() {
        let cache = PkceCache::new(DEFAULT_STATE_TTL);
        assert_eq!(cache.consume("never-issued").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_unreadable_before_sweep() -> Result<()> {
        let cache = PkceCache::new(Duration::from_secs(60));
        let pkce = cache.begin().await?;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.consume(&pkce.state).await, None);
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_only_removes_expired() -> Result<()> {
        let cache = PkceCache::new(Duration::from_secs(60));
        cache.begin().await?;
        tokio::time::advance(Duration::from_secs(30)).await;
        let fresh = cache.begin().await?;
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.consume(&fresh.state).await, Some(fresh.verifier));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_sweeps_periodically_and_stops() -> Result<()> {
        let cache = Arc::new(PkceCache::new(Duration::from_secs(5)));
        cache.begin().await?;
        let janitor = cache.spawn_janitor(Duration::from_secs(10));
        assert!(janitor.is_running());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty().await);

        janitor.shutdown().await;
        cache.begin().await?;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cache.len().await, 1);
        Ok(())
    }
}
