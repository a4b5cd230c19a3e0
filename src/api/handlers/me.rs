//! Authenticated self-service endpoints.
//!
//! Flow Overview:
//! 1) The role gate validates the bearer token and stores the principal.
//! 2) Handlers act on the principal's own account and sessions only.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::auth::{
    types::{AccountResponse, ErrorBody, MessageResponse, SessionSummary},
    AuthState,
};
use crate::auth::Principal;

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Return the authenticated account.", body = AccountResponse),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Role not allowed.", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn me(
    Extension(principal): Extension<Principal>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    match auth_state.sessions().account(principal.account_id).await {
        Ok(account) => (StatusCode::OK, Json(AccountResponse::from(&account))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Active sessions, newest first.", body = [SessionSummary]),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn list_sessions(
    Extension(principal): Extension<Principal>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    match auth_state.sessions().list_active(principal.account_id).await {
        Ok(sessions) => {
            let body: Vec<SessionSummary> = sessions.iter().map(SessionSummary::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(
        ("id" = String, Path, description = "Public session handle from `GET /sessions`")
    ),
    responses(
        (status = 200, description = "Session revoked.", body = MessageResponse),
        (status = 400, description = "Malformed session id.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Session belongs to another account.", body = ErrorBody),
        (status = 404, description = "Session not found.", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn revoke_session(
    Extension(principal): Extension<Principal>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Response {
    match auth_state
        .sessions()
        .revoke_by_owner(principal.account_id, &id)
        .await
    {
        Ok(()) => {
            info!(account_id = principal.account_id, session_id = %id, "session revoked");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "session revoked".to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}
