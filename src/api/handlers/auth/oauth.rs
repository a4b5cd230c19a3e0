//! Google login: redirect to the provider, then redeem the callback.

use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, warn};

use super::{
    session::issued_response,
    state::AuthState,
    types::{AuthResponse, CallbackParams, ErrorBody},
    utils::client_meta,
};
use crate::auth::AuthError;

#[utoipa::path(
    get,
    path = "/auth/google/login",
    responses(
        (status = 302, description = "Redirect to the provider authorization URL")
    ),
    tag = "oauth"
)]
pub async fn google_login(auth_state: Extension<Arc<AuthState>>) -> Response {
    let (pkce, url) = match auth_state.exchange().start().await {
        Ok(started) => started,
        Err(err) => return err.into_response(),
    };
    debug!(state = %pkce.state, "oauth login started");

    match HeaderValue::from_str(url.as_str()) {
        Ok(location) => {
            let mut headers = HeaderMap::new();
            headers.insert(LOCATION, location);
            (StatusCode::FOUND, headers).into_response()
        }
        Err(err) => AuthError::Internal(err.into()).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "State issued by /auth/google/login")
    ),
    responses(
        (status = 200, description = "Signed in; the session cookie is set", body = AuthResponse),
        (status = 400, description = "Missing code or state, or the provider reported an error", body = ErrorBody),
        (status = 401, description = "Unknown or expired state", body = ErrorBody),
        (status = 503, description = "Provider unreachable or rejected the exchange", body = ErrorBody)
    ),
    tag = "oauth"
)]
pub async fn google_callback(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    auth_state: Extension<Arc<AuthState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error.as_deref() {
        warn!(error, "provider returned an error to the callback");
        return AuthError::BadRequest("authorization was not granted".to_string()).into_response();
    }
    let (Some(code), Some(state)) = (
        params.code.as_deref().filter(|v| !v.is_empty()),
        params.state.as_deref().filter(|v| !v.is_empty()),
    ) else {
        return AuthError::BadRequest("missing code or state".to_string()).into_response();
    };

    let profile = match auth_state.exchange().callback(code, state).await {
        Ok(profile) => profile,
        Err(err) => return err.into_response(),
    };

    match auth_state
        .sessions()
        .login_external(&profile, client_meta(&headers, peer))
        .await
    {
        Ok(issued) => issued_response(&auth_state, &issued),
        Err(err) => err.into_response(),
    }
}
