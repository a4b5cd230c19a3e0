use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub type AccountId = i64;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating an account; id and timestamps are assigned
/// by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub email_verified: bool,
}

impl NewAccount {
    /// Local account with a password digest and the default role.
    #[must_use]
    pub fn local(name: String, email: String, password_hash: String) -> Self {
        Self {
            name,
            email: Some(email),
            role: ROLE_USER.to_string(),
            password_hash: Some(password_hash),
            external_id: None,
            email_verified: false,
        }
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Account),
    /// Email or external id already belongs to another account.
    Conflict,
}
