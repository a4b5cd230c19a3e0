use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::Instrument;

use super::models::{Account, AccountId, CreateOutcome, NewAccount};
use crate::db::is_unique_violation;

/// User-record store consumed by the session core.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    /// `email` must already be normalized.
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Account>>;

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome>;

    /// Persist every mutable field of `account`.
    async fn update(&self, account: &Account) -> Result<()>;
}

const ACCOUNT_COLUMNS: &str =
    "id, name, email, role, password_hash, external_id, email_verified, created_at";

pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .with_context(|| format!("failed to lookup account by {column}"))
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let query = "SELECT id, name, email, role, password_hash, external_id, email_verified, created_at FROM accounts WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, Account>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by id")
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.fetch_one_by("email", email).await
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Account>> {
        self.fetch_one_by("external_id", external_id).await
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let query = r"
            INSERT INTO accounts (name, email, role, password_hash, external_id, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, role, password_hash, external_id, email_verified, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query_as::<_, Account>(query)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.role)
            .bind(&account.password_hash)
            .bind(&account.external_id)
            .bind(account.email_verified)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(created) => Ok(CreateOutcome::Created(created)),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(anyhow::Error::new(err).context("failed to insert account")),
        }
    }

    async fn update(&self, account: &Account) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET name = $2, email = $3, role = $4, password_hash = $5,
                external_id = $6, email_verified = $7
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account.id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.role)
            .bind(&account.password_hash)
            .bind(&account.external_id)
            .bind(account.email_verified)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update account")?;
        Ok(())
    }
}
