use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{warn, Instrument};

use super::models::{NewSession, Session, SessionId, SessionRecord};
use crate::accounts::{Account, AccountId};
use crate::db::is_unique_violation;

const MAX_ID_ATTEMPTS: usize = 3;

/// Durable session storage; the single source of truth for rotation and
/// revocation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session under a freshly generated identifier.
    async fn create(&self, session: NewSession) -> Result<Session>;

    /// Look up a session and its owning account by public handle.
    async fn find_by_id(&self, id: SessionId) -> Result<Option<SessionRecord>>;

    /// Look up a session and its owning account by refresh-token hash.
    async fn find_by_token(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>>;

    /// Remove the row. Returns whether a row was removed.
    async fn delete(&self, id: SessionId) -> Result<bool>;

    /// Remove the row holding `token_hash`. Returns whether a row was removed.
    async fn delete_by_token(&self, token_hash: &[u8]) -> Result<bool>;

    /// Remove the row only while it is unrevoked and `expires_at > now`.
    ///
    /// Of several concurrent callers racing on the same identifier, at most
    /// one observes `true`.
    async fn delete_if_active(&self, id: SessionId, now: DateTime<Utc>) -> Result<bool>;

    /// Unrevoked, unexpired sessions of `account_id`, newest first.
    async fn find_active_by_owner(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>>;

    /// Set the revoked flag, keeping the row. Returns whether a row matched.
    async fn revoke(&self, id: SessionId) -> Result<bool>;
}

const SESSION_COLUMNS: &str =
    "id, account_id, revoked, expires_at, user_agent, client_ip, created_at";

const RECORD_SELECT: &str = r"
    SELECT s.id, s.account_id, s.revoked, s.expires_at, s.user_agent, s.client_ip, s.created_at,
           a.name AS account_name, a.email AS account_email, a.role AS account_role,
           a.password_hash AS account_password_hash, a.external_id AS account_external_id,
           a.email_verified AS account_email_verified, a.created_at AS account_created_at
    FROM sessions s
    JOIN accounts a ON a.id = s.account_id
";

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, id: SessionId, session: &NewSession) -> Result<Session, sqlx::Error> {
        let query = r"
            INSERT INTO sessions (id, token_hash, account_id, expires_at, user_agent, client_ip)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, account_id, revoked, expires_at, user_agent, client_ip, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query_as::<_, Session>(query)
            .bind(id)
            .bind(&session.token_hash)
            .bind(session.account_id)
            .bind(session.expires_at)
            .bind(&session.meta.user_agent)
            .bind(&session.meta.client_ip)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
    }

    async fn find_record(&self, filter: &str, key: Key<'_>) -> Result<Option<SessionRecord>> {
        let query = format!("{RECORD_SELECT} WHERE {filter} = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let statement = sqlx::query(&query);
        let statement = match key {
            Key::Id(id) => statement.bind(id),
            Key::TokenHash(hash) => statement.bind(hash),
        };
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;
        row.as_ref()
            .map(record_from_row)
            .transpose()
            .context("failed to decode session row")
    }
}

enum Key<'a> {
    Id(SessionId),
    TokenHash(&'a [u8]),
}

fn record_from_row(row: &PgRow) -> Result<SessionRecord, sqlx::Error> {
    let session = Session {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        revoked: row.try_get("revoked")?,
        expires_at: row.try_get("expires_at")?,
        user_agent: row.try_get("user_agent")?,
        client_ip: row.try_get("client_ip")?,
        created_at: row.try_get("created_at")?,
    };
    let account = Account {
        id: session.account_id,
        name: row.try_get("account_name")?,
        email: row.try_get("account_email")?,
        role: row.try_get("account_role")?,
        password_hash: row.try_get("account_password_hash")?,
        external_id: row.try_get("account_external_id")?,
        email_verified: row.try_get("account_email_verified")?,
        created_at: row.try_get("account_created_at")?,
    };
    Ok(SessionRecord { session, account })
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: NewSession) -> Result<Session> {
        // A v4 collision is not expected, but the primary key would reject it.
        for _ in 0..MAX_ID_ATTEMPTS {
            match self.insert(SessionId::generate(), &session).await {
                Ok(created) => return Ok(created),
                Err(err) if is_unique_violation(&err) => {
                    warn!("session id collision, retrying");
                }
                Err(err) => return Err(anyhow::Error::new(err).context("failed to insert session")),
            }
        }
        Err(anyhow!("failed to allocate a unique session id"))
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<SessionRecord>> {
        self.find_record("s.id", Key::Id(id)).await
    }

    async fn find_by_token(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        self.find_record("s.token_hash", Key::TokenHash(token_hash))
            .await
    }

    async fn delete(&self, id: SessionId) -> Result<bool> {
        let query = "DELETE FROM sessions WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_token(&self, token_hash: &[u8]) -> Result<bool> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_active(&self, id: SessionId, now: DateTime<Utc>) -> Result<bool> {
        let query = r"
            DELETE FROM sessions
            WHERE id = $1 AND NOT revoked AND expires_at > $2
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate session")?;
        Ok(row.is_some())
    }

    async fn find_active_by_owner(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE account_id = $1 AND NOT revoked AND expires_at > $2 \
             ORDER BY created_at DESC"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(account_id)
            .bind(now)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list sessions")
    }

    async fn revoke(&self, id: SessionId) -> Result<bool> {
        let query = "UPDATE sessions SET revoked = TRUE WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke session")?;
        Ok(result.rows_affected() > 0)
    }
}
