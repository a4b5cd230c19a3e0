//! Refresh and logout, plus the `refresh_token` cookie they manage.

use axum::{
    extract::{ConnectInfo, Extension},
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc};
use tracing::error;

use super::{
    state::{AuthConfig, AuthState},
    types::{AuthResponse, MessageResponse},
    utils::client_meta,
};
use crate::auth::AuthError;
use crate::session::{IssuedSession, Session};

pub(crate) const REFRESH_COOKIE_NAME: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/auth";

#[utoipa::path(
    post,
    path = "/auth/refresh",
    params(
        ("refresh_token" = Option<String>, Cookie, description = "Refresh token")
    ),
    responses(
        (status = 200, description = "Session rotated; a new cookie is set", body = AuthResponse),
        (status = 401, description = "Missing, unknown, revoked or expired session; cookie cleared", body = super::types::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let presented = extract_session_token(&headers).unwrap_or_default();
    match auth_state
        .sessions()
        .refresh(&presented, client_meta(&headers, peer))
        .await
    {
        Ok(issued) => issued_response(&auth_state, &issued),
        // A failed refresh always leaves the browser without a cookie.
        Err(err) => with_cleared_cookie(auth_state.config(), err.into_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    params(
        ("refresh_token" = Option<String>, Cookie, description = "Refresh token")
    ),
    responses(
        (status = 200, description = "Session deleted and cookie cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let presented = extract_session_token(&headers).unwrap_or_default();
    let response = match auth_state.sessions().logout(&presented).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "logged out".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    };
    with_cleared_cookie(auth_state.config(), response)
}

/// 200 with the token body and a fresh session cookie.
pub(super) fn issued_response(auth_state: &AuthState, issued: &IssuedSession) -> Response {
    let cookie = match session_cookie(
        auth_state.config(),
        &issued.refresh_token,
        &issued.session,
    ) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return AuthError::Internal(err.into()).into_response();
        }
    };
    let expires_in = auth_state.sessions().tokens().ttl().num_seconds();
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    (
        StatusCode::OK,
        headers,
        Json(AuthResponse::new(issued, expires_in)),
    )
        .into_response()
}

fn with_cleared_cookie(config: &AuthConfig, mut response: Response) -> Response {
    match clear_session_cookie(config) {
        Ok(cookie) => {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build clearing cookie: {err}"),
    }
    response
}

/// `HttpOnly`, `SameSite=Strict` cookie scoped to `/auth` carrying the
/// refresh token; it lives as long as the session does.
pub(super) fn session_cookie(
    config: &AuthConfig,
    refresh_token: &str,
    session: &Session,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={refresh_token}; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict; Max-Age={max_age}"
    );
    push_scope(config, &mut cookie);
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}=; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    );
    push_scope(config, &mut cookie);
    HeaderValue::from_str(&cookie)
}

fn push_scope(config: &AuthConfig, cookie: &mut String) {
    if let Some(domain) = config.cookie_domain() {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().map(str::trim);
            let val = parts.next().map(str::trim);
            if let (Some(REFRESH_COOKIE_NAME), Some(val)) = (key, val) {
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}
