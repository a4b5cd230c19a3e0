//! In-process session store for tests and local runs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use super::models::{NewSession, Session, SessionId, SessionRecord};
use super::repo::SessionStore;
use crate::accounts::{AccountDirectory, AccountId};

pub struct MemorySessionStore {
    accounts: Arc<dyn AccountDirectory>,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    seq: u64,
    // (insertion order, session); the sequence breaks created_at ties.
    sessions: HashMap<SessionId, (u64, Session)>,
    by_token: HashMap<Vec<u8>, SessionId>,
}

impl Inner {
    fn remove(&mut self, id: SessionId) -> bool {
        self.by_token.retain(|_, held| *held != id);
        self.sessions.remove(&id).is_some()
    }
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self {
            accounts,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Raw lookup without the account join; revoked and expired rows included.
    pub async fn get(&self, id: SessionId) -> Option<Session> {
        self.inner
            .read()
            .await
            .sessions
            .get(&id)
            .map(|(_, session)| session.clone())
    }

    /// Public handle of the session holding `token_hash`.
    pub async fn id_for_token(&self, token_hash: &[u8]) -> Option<SessionId> {
        self.inner.read().await.by_token.get(token_hash).copied()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Overwrite `expires_at` of an existing row.
    pub async fn set_expires_at(&self, id: SessionId, expires_at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&id) {
            Some((_, session)) => {
                session.expires_at = expires_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: NewSession) -> Result<Session> {
        let mut inner = self.inner.write().await;
        if inner.by_token.contains_key(&session.token_hash) {
            return Err(anyhow!("duplicate session token"));
        }
        let mut id = SessionId::generate();
        while inner.sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        let created = Session {
            id,
            account_id: session.account_id,
            revoked: false,
            expires_at: session.expires_at,
            user_agent: session.meta.user_agent,
            client_ip: session.meta.client_ip,
            created_at: Utc::now(),
        };
        inner.seq += 1;
        let seq = inner.seq;
        inner.sessions.insert(id, (seq, created.clone()));
        inner.by_token.insert(session.token_hash, id);
        Ok(created)
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<SessionRecord>> {
        let Some(session) = self.get(id).await else {
            return Ok(None);
        };
        let account = self
            .accounts
            .get_by_id(session.account_id)
            .await?
            .ok_or_else(|| anyhow!("session {id} references missing account"))?;
        Ok(Some(SessionRecord { session, account }))
    }

    async fn find_by_token(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        match self.id_for_token(token_hash).await {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn delete(&self, id: SessionId) -> Result<bool> {
        Ok(self.inner.write().await.remove(id))
    }

    async fn delete_by_token(&self, token_hash: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.by_token.get(token_hash).copied() {
            Some(id) => Ok(inner.remove(id)),
            None => Ok(false),
        }
    }

    async fn delete_if_active(&self, id: SessionId, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let usable = inner
            .sessions
            .get(&id)
            .is_some_and(|(_, session)| session.is_usable_at(now));
        if usable {
            inner.remove(id);
        }
        Ok(usable)
    }

    async fn find_active_by_owner(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let inner = self.inner.read().await;
        let mut active: Vec<&(u64, Session)> = inner
            .sessions
            .values()
            .filter(|(_, session)| session.account_id == account_id && session.is_usable_at(now))
            .collect();
        active.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        Ok(active.into_iter().map(|(_, session)| session.clone()).collect())
    }

    async fn revoke(&self, id: SessionId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&id) {
            Some((_, session)) => {
                session.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{CreateOutcome, MemoryAccountDirectory, NewAccount};
    use crate::session::models::ClientMeta;
    use crate::session::token::hash_session_token;
    use chrono::Duration;

    async fn store_with_account() -> Result<(MemorySessionStore, AccountId)> {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let CreateOutcome::Created(account) = accounts
            .create(NewAccount::local(
                "Ada".to_string(),
                "ada@example.com".to_string(),
                "digest".to_string(),
            ))
            .await?
        else {
            return Err(anyhow!("account not created"));
        };
        Ok((MemorySessionStore::new(accounts), account.id))
    }

    fn new_session(account_id: AccountId, ttl: Duration) -> NewSession {
        NewSession {
            account_id,
            token_hash: hash_session_token(&SessionId::generate().to_string()),
            expires_at: Utc::now() + ttl,
            meta: ClientMeta::default(),
        }
    }

    #[tokio::test]
    async fn find_joins_owner() -> Result<()> {
        let (store, owner) = store_with_account().await?;
        let session = store.create(new_session(owner, Duration::days(1))).await?;
        let record = store.find_by_id(session.id).await?.ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(record.session, session);
        assert_eq!(record.account.id, owner);
        Ok(())
    }

    #[tokio::test]
    async fn token_lookup_and_delete() -> Result<()> {
        let (store, owner) = store_with_account().await?;
        let new = new_session(owner, Duration::days(1));
        let token_hash = new.token_hash.clone();
        let session = store.create(new).await?;

        let record = store
            .find_by_token(&token_hash)
            .await?
            .ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(record.session.id, session.id);
        assert!(store.find_by_token(b"unknown").await?.is_none());

        assert!(store.delete_by_token(&token_hash).await?);
        assert!(!store.delete_by_token(&token_hash).await?);
        assert!(store.is_empty().await);
        assert!(store.id_for_token(&token_hash).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn conditional_delete_only_wins_once() -> Result<()> {
        let (store, owner) = store_with_account().await?;
        let session = store.create(new_session(owner, Duration::days(1))).await?;
        let now = Utc::now();
        assert!(store.delete_if_active(session.id, now).await?);
        assert!(!store.delete_if_active(session.id, now).await?);
        Ok(())
    }

    #[tokio::test]
    async fn conditional_delete_keeps_revoked_and_expired_rows() -> Result<()> {
        let (store, owner) = store_with_account().await?;
        let revoked = store.create(new_session(owner, Duration::days(1))).await?;
        store.revoke(revoked.id).await?;
        let expired = store.create(new_session(owner, Duration::zero())).await?;

        let now = Utc::now();
        assert!(!store.delete_if_active(revoked.id, now).await?);
        assert!(!store.delete_if_active(expired.id, now).await?);
        assert_eq!(store.len().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn active_listing_is_newest_first() -> Result<()> {
        let (store, owner) = store_with_account().await?;
        let first = store.create(new_session(owner, Duration::days(1))).await?;
        let second = store.create(new_session(owner, Duration::days(1))).await?;
        let revoked = store.create(new_session(owner, Duration::days(1))).await?;
        store.revoke(revoked.id).await?;
        store.create(new_session(owner, Duration::zero())).await?;
        store.create(new_session(owner + 1, Duration::days(1))).await?;

        let active = store.find_active_by_owner(owner, Utc::now()).await?;
        let ids: Vec<SessionId> = active.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_keeps_row() -> Result<()> {
        let (store, owner) = store_with_account().await?;
        let session = store.create(new_session(owner, Duration::days(1))).await?;
        assert!(store.revoke(session.id).await?);
        assert!(store.get(session.id).await.is_some_and(|s| s.revoked));
        assert!(!store.revoke(SessionId::generate()).await?);
        Ok(())
    }
}
