use anyhow::Context;
use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, instrument, warn};

use super::models::{ClientMeta, NewSession, Session, SessionId};
use super::repo::SessionStore;
use super::token::{generate_session_token, hash_session_token, is_well_formed};
use crate::accounts::{
    normalize_email, Account, AccountDirectory, AccountId, CreateOutcome, NewAccount, ROLE_USER,
};
use crate::auth::{AccessTokens, AuthError, CredentialHasher};
use crate::oauth::ExternalProfile;

const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=100;

/// Result of every successful login, refresh or external login.
///
/// `refresh_token` is the only copy of the raw credential; it belongs in the
/// session cookie and nowhere else.
#[derive(Clone)]
pub struct IssuedSession {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
    pub session: Session,
}

impl std::fmt::Debug for IssuedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedSession")
            .field("account", &self.account)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RegisterAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login, refresh rotation, logout and session management on top of an
/// account directory and a session store.
#[derive(Clone)]
pub struct SessionService {
    accounts: Arc<dyn AccountDirectory>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<AccessTokens>,
    hasher: CredentialHasher,
    refresh_ttl: Duration,
}

impl SessionService {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<AccessTokens>,
        hasher: CredentialHasher,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            accounts,
            sessions,
            tokens,
            hasher,
            refresh_ttl,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &AccessTokens {
        &self.tokens
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Create a local account. Does not log the new account in.
    ///
    /// # Errors
    /// `BadRequest` for malformed input, `Conflict` when the email is taken.
    #[instrument(skip_all)]
    pub async fn register(&self, request: RegisterAccount) -> Result<Account, AuthError> {
        let email = normalize_email(&request.email);
        if !valid_email(&email) {
            return Err(AuthError::BadRequest("invalid email".to_string()));
        }
        let name = request.name.trim().to_string();
        if !NAME_LEN.contains(&name.chars().count()) {
            return Err(AuthError::BadRequest(
                "name must be between 3 and 20 characters".to_string(),
            ));
        }
        check_password_shape(&request.password)?;

        let digest = self.hash_password(request.password).await?;
        match self
            .accounts
            .create(NewAccount::local(name, email, digest))
            .await?
        {
            CreateOutcome::Created(account) => {
                info!(account_id = account.id, "account registered");
                Ok(account)
            }
            CreateOutcome::Conflict => Err(AuthError::Conflict("email already registered".to_string())),
        }
    }

    /// Verify email and password, then open a session.
    ///
    /// # Errors
    /// `Unauthorized` for any credential mismatch, `BadRequest` for malformed input.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: ClientMeta,
    ) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::BadRequest("invalid email".to_string()));
        }
        check_password_shape(password)?;

        let Some(account) = self.accounts.get_by_email(&email).await? else {
            self.verify_dummy(password.to_string()).await?;
            return Err(AuthError::Unauthorized);
        };
        let Some(digest) = account.password_hash.clone() else {
            // Created through external login; there is no password to check.
            self.verify_dummy(password.to_string()).await?;
            return Err(AuthError::Unauthorized);
        };
        if !self.verify_password(digest, password.to_string()).await? {
            return Err(AuthError::Unauthorized);
        }

        self.create_session(account, meta).await
    }

    /// Open a session for the account behind an external profile.
    ///
    /// # Errors
    /// See [`Self::resolve_external_account`] and [`Self::create_session`].
    #[instrument(skip_all, fields(subject = %profile.subject))]
    pub async fn login_external(
        &self,
        profile: &ExternalProfile,
        meta: ClientMeta,
    ) -> Result<IssuedSession, AuthError> {
        let account = self.resolve_external_account(profile).await?;
        self.create_session(account, meta).await
    }

    /// Map an external profile to a local account: by external id, then by
    /// email, then by creating one.
    ///
    /// An account found by email is linked only when the provider vouches for
    /// the address and the account is not already linked to another subject;
    /// an existing link is never overwritten.
    ///
    /// # Errors
    /// `Unauthorized` when the email matches but is unverified or already
    /// linked elsewhere, `Conflict` when a concurrent registration claimed
    /// the email first.
    pub async fn resolve_external_account(
        &self,
        profile: &ExternalProfile,
    ) -> Result<Account, AuthError> {
        if let Some(account) = self.accounts.get_by_external_id(&profile.subject).await? {
            return Ok(account);
        }

        let email = profile
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty());

        if let Some(email) = email.as_deref() {
            if let Some(mut account) = self.accounts.get_by_email(email).await? {
                if !profile.email_verified {
                    warn!(account_id = account.id, "external email matches but is unverified");
                    return Err(AuthError::Unauthorized);
                }
                if account.external_id.is_some() {
                    warn!(
                        account_id = account.id,
                        "external email matches an account linked to another subject"
                    );
                    return Err(AuthError::Unauthorized);
                }
                account.external_id = Some(profile.subject.clone());
                account.email_verified = true;
                self.accounts.update(&account).await?;
                info!(account_id = account.id, "linked external identity to account");
                return Ok(account);
            }
        }

        let name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or(email.as_deref())
            .unwrap_or(profile.subject.as_str())
            .to_string();

        let outcome = self
            .accounts
            .create(NewAccount {
                name,
                email,
                role: ROLE_USER.to_string(),
                password_hash: None,
                external_id: Some(profile.subject.clone()),
                email_verified: profile.email_verified,
            })
            .await?;
        match outcome {
            CreateOutcome::Created(account) => {
                info!(account_id = account.id, "account created from external identity");
                Ok(account)
            }
            CreateOutcome::Conflict => Err(AuthError::Conflict(
                "account already exists for this identity".to_string(),
            )),
        }
    }

    /// Issue an access token and persist a new session for `account`.
    ///
    /// # Errors
    /// `Internal` if signing or the insert fails; no token escapes in that case.
    pub async fn create_session(
        &self,
        account: Account,
        meta: ClientMeta,
    ) -> Result<IssuedSession, AuthError> {
        let access_token = self.tokens.issue(account.id, &account.role)?;
        let refresh_token = generate_session_token()?;
        let session = self
            .sessions
            .create(NewSession {
                account_id: account.id,
                token_hash: hash_session_token(&refresh_token),
                expires_at: Utc::now() + self.refresh_ttl,
                meta,
            })
            .await
            .context("failed to create session")?;
        info!(account_id = account.id, session_id = %session.id, "session created");
        Ok(IssuedSession {
            account,
            access_token,
            refresh_token,
            session,
        })
    }

    /// Exchange a refresh token for a new session and access token.
    ///
    /// The presented token is spent whether or not rotation succeeds:
    /// revoked and expired rows are deleted, and a usable row is deleted
    /// before its replacement is created.
    ///
    /// # Errors
    /// `Unauthorized` for unknown or malformed tokens and for the loser of a
    /// concurrent rotation; `SessionRevoked` / `SessionExpired` otherwise.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        presented: &str,
        meta: ClientMeta,
    ) -> Result<IssuedSession, AuthError> {
        if !is_well_formed(presented) {
            return Err(AuthError::Unauthorized);
        }
        let Some(record) = self
            .sessions
            .find_by_token(&hash_session_token(presented))
            .await?
        else {
            return Err(AuthError::Unauthorized);
        };
        let id = record.session.id;

        let now = Utc::now();
        if record.session.revoked {
            self.discard(id).await;
            warn!(session_id = %id, "refresh with revoked session");
            return Err(AuthError::SessionRevoked);
        }
        if record.session.is_expired_at(now) {
            self.discard(id).await;
            return Err(AuthError::SessionExpired);
        }

        if !self.sessions.delete_if_active(id, now).await? {
            warn!(session_id = %id, "session rotated concurrently");
            return Err(AuthError::Unauthorized);
        }

        self.create_session(record.account, meta).await
    }

    /// Delete the session holding the refresh token if it exists. Malformed
    /// tokens are ignored.
    ///
    /// # Errors
    /// `Internal` if the store fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, presented: &str) -> Result<(), AuthError> {
        if !is_well_formed(presented) {
            return Ok(());
        }
        self.sessions
            .delete_by_token(&hash_session_token(presented))
            .await?;
        Ok(())
    }

    /// Unrevoked, unexpired sessions of `account_id`, newest first.
    ///
    /// # Errors
    /// `Internal` if the store fails.
    pub async fn list_active(&self, account_id: AccountId) -> Result<Vec<Session>, AuthError> {
        Ok(self
            .sessions
            .find_active_by_owner(account_id, Utc::now())
            .await?)
    }

    /// Revoke one of the caller's own sessions.
    ///
    /// # Errors
    /// `BadRequest` for malformed ids, `NotFound` for unknown ids and
    /// `Forbidden` when the session belongs to another account.
    #[instrument(skip(self, presented))]
    pub async fn revoke_by_owner(
        &self,
        account_id: AccountId,
        presented: &str,
    ) -> Result<(), AuthError> {
        let id = SessionId::parse(presented)
            .ok_or_else(|| AuthError::BadRequest("invalid session id format".to_string()))?;
        let Some(record) = self.sessions.find_by_id(id).await? else {
            return Err(AuthError::NotFound);
        };
        if record.session.account_id != account_id {
            warn!(session_id = %id, "revoke attempted by non-owner");
            return Err(AuthError::Forbidden);
        }
        self.sessions.revoke(id).await?;
        info!(session_id = %id, "session revoked");
        Ok(())
    }

    /// # Errors
    /// `NotFound` when the account no longer exists.
    pub async fn account(&self, account_id: AccountId) -> Result<Account, AuthError> {
        self.accounts
            .get_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    async fn discard(&self, id: SessionId) {
        if let Err(err) = self.sessions.delete(id).await {
            warn!(session_id = %id, "failed to delete unusable session: {err:#}");
        }
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("password hashing task failed")??;
        Ok(digest)
    }

    async fn verify_password(&self, digest: String, password: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&digest, &password))
            .await
            .context("password verification task failed")?;
        Ok(matches)
    }

    async fn verify_dummy(&self, password: String) -> Result<(), AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_dummy(&password))
            .await
            .context("password verification task failed")?;
        Ok(())
    }
}

/// Basic email format check on already-normalized input.
fn valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(email))
}

fn check_password_shape(password: &str) -> Result<(), AuthError> {
    if PASSWORD_LEN.contains(&password.chars().count()) {
        Ok(())
    } else {
        Err(AuthError::BadRequest(
            "password must be between 8 and 100 characters".to_string(),
        ))
    }
}
