//! Request and response bodies for the auth and session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::accounts::Account;
use crate::session::{IssuedSession, Session};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public view of an account; never carries the password digest.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub email_verified: bool,
    pub created_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role.clone(),
            email_verified: account.email_verified,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Body returned by login, refresh and the OAuth callback. The refresh token
/// travels only in the `refresh_token` cookie.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub account: AccountResponse,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    #[must_use]
    pub fn new(issued: &IssuedSession, expires_in: i64) -> Self {
        Self {
            account: AccountResponse::from(&issued.account),
            access_token: issued.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// One active session as shown to its owner. `id` is the public handle used
/// by `DELETE /sessions/{id}`; it cannot be used to refresh.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    pub id: String,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            user_agent: session.user_agent.clone(),
            client_ip: session.client_ip.clone(),
            created_at: session.created_at.to_rfc3339(),
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
