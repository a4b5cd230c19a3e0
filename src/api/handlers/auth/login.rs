//! Password registration and login.

use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

use super::{
    session::issued_response,
    state::AuthState,
    types::{AccountResponse, AuthResponse, ErrorBody, LoginRequest, RegisterRequest},
    utils::client_meta,
};
use crate::auth::AuthError;
use crate::session::RegisterAccount;

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AccountResponse),
        (status = 400, description = "Malformed email, name or password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::BadRequest("missing payload".to_string()).into_response();
    };

    match auth_state
        .sessions()
        .register(RegisterAccount {
            name: request.name,
            email: request.email,
            password: request.password,
        })
        .await
    {
        Ok(account) => {
            info!(account_id = account.id, "account registered");
            (StatusCode::OK, Json(AccountResponse::from(&account))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; the session cookie is set", body = AuthResponse),
        (status = 400, description = "Malformed email or password", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::BadRequest("missing payload".to_string()).into_response();
    };

    match auth_state
        .sessions()
        .login(
            &request.email,
            &request.password,
            client_meta(&headers, peer),
        )
        .await
    {
        Ok(issued) => issued_response(&auth_state, &issued),
        Err(err) => err.into_response(),
    }
}
