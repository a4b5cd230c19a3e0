use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::accounts::{Account, AccountId};

/// Public handle of a session, used to list and revoke it and in logs.
/// It is not a credential; refresh goes through the cookie token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a handle from a request path. Anything that is not a
    /// well-formed UUID yields `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    pub id: SessionId,
    pub account_id: AccountId,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Unrevoked and not yet expired.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub account_id: AccountId,
    /// SHA-256 of the refresh token handed to the client.
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub meta: ClientMeta,
}

/// Advisory client details recorded on a session for display and audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

/// A session together with the account that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: Session,
    pub account: Account,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(revoked: bool, expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: SessionId::generate(),
            account_id: 1,
            revoked,
            expires_at: now + expires_in,
            user_agent: None,
            client_ip: None,
            created_at: now,
        }
    }

    #[test]
    fn parse_accepts_uuid_and_rejects_garbage() {
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
        assert_eq!(SessionId::parse(""), None);
        assert_eq!(SessionId::parse("not-a-session"), None);
    }

    #[test]
    fn generated_ids_are_v4() {
        let id = SessionId::generate();
        assert_eq!(id.as_uuid().get_version_num(), 4);
        assert_ne!(id, SessionId::generate());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let s = session(false, Duration::zero());
        assert!(s.is_expired_at(s.expires_at));
        assert!(!s.is_usable_at(s.expires_at));
        assert!(s.is_usable_at(s.expires_at - Duration::seconds(1)));
    }

    #[test]
    fn revoked_is_never_usable() {
        let s = session(true, Duration::days(1));
        assert!(!s.is_usable_at(Utc::now()));
    }
}
