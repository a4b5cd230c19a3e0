use thiserror::Error;

/// Failures surfaced by the auth and session core.
///
/// Credential failures are deliberately coarse: every variant that ends in a
/// 401 renders the same public message so callers cannot tell an unknown
/// account from a bad password or a replayed session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("access token is malformed or has a bad signature")]
    InvalidToken,

    #[error("access token has expired")]
    TokenExpired,

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("session has expired")]
    SessionExpired,

    #[error("oauth state is unknown, expired or already used")]
    StateMismatch,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("resource not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("identity provider token exchange failed")]
    Exchange(#[source] anyhow::Error),

    #[error("identity provider profile fetch failed")]
    Profile(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// True for every variant that means "the caller is not authenticated".
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::InvalidToken
                | Self::TokenExpired
                | Self::SessionRevoked
                | Self::SessionExpired
                | Self::StateMismatch
        )
    }
}
