//! In-process account directory for tests and local runs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::models::{Account, AccountId, CreateOutcome, NewAccount};
use super::repo::AccountDirectory;

#[derive(Default)]
pub struct MemoryAccountDirectory {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AccountId,
    accounts: BTreeMap<AccountId, Account>,
}

impl Inner {
    fn clashes(&self, email: Option<&str>, external_id: Option<&str>, skip: AccountId) -> bool {
        self.accounts.values().any(|existing| {
            existing.id != skip
                && ((email.is_some() && existing.email.as_deref() == email)
                    || (external_id.is_some() && existing.external_id.as_deref() == external_id))
        })
    }
}

impl MemoryAccountDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| account.email.as_deref() == Some(email))
            .cloned())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| account.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let mut inner = self.inner.write().await;
        if inner.clashes(account.email.as_deref(), account.external_id.as_deref(), 0) {
            return Ok(CreateOutcome::Conflict);
        }
        inner.next_id += 1;
        let created = Account {
            id: inner.next_id,
            name: account.name,
            email: account.email,
            role: account.role,
            password_hash: account.password_hash,
            external_id: account.external_id,
            email_verified: account.email_verified,
            created_at: Utc::now(),
        };
        inner.accounts.insert(created.id, created.clone());
        Ok(CreateOutcome::Created(created))
    }

    async fn update(&self, account: &Account) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.clashes(
            account.email.as_deref(),
            account.external_id.as_deref(),
            account.id,
        ) {
            return Err(anyhow!("account {} clashes with an existing account", account.id));
        }
        let slot = inner
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| anyhow!("account {} does not exist", account.id))?;
        *slot = account.clone();
        Ok(())
    }
}
