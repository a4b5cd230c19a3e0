//! Bearer authentication and the role gate for member routes.
//!
//! Flow Overview: read `Authorization: Bearer <token>`, validate it with the
//! access-token key, check the caller's role against the route's allow-list,
//! and leave the [`Principal`] in the request extensions for the handler.

use axum::{
    extract::{Extension, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::state::AuthState;
use crate::auth::{AuthError, Principal};

/// Roles admitted by a gated route. An empty list admits any authenticated caller.
#[derive(Clone, Copy, Debug)]
pub struct AllowedRoles(pub &'static [&'static str]);

impl AllowedRoles {
    pub const ANY: Self = Self(&[]);

    #[must_use]
    pub fn admits(&self, role: &str) -> bool {
        self.0.is_empty() || self.0.contains(&role)
    }
}

/// Resolve the bearer token into a principal.
///
/// # Errors
/// `Unauthorized` when the header is missing or not a bearer credential, and
/// the validator's error when the token itself is rejected.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Principal, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthorized)?;
    auth_state.sessions().tokens().validate(token)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware for `axum::middleware::from_fn_with_state(AllowedRoles(..), require_roles)`.
pub async fn require_roles(
    State(allowed): State<AllowedRoles>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match require_auth(request.headers(), &auth_state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };
    if !allowed.admits(&principal.role) {
        return AuthError::Forbidden.into_response();
    }
    request.extensions_mut().insert(principal);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn empty_allow_list_admits_everyone() {
        assert!(AllowedRoles::ANY.admits("user"));
        assert!(AllowedRoles::ANY.admits("auditor"));
    }

    #[test]
    fn allow_list_is_exact() {
        let roles = AllowedRoles(&["admin"]);
        assert!(roles.admits("admin"));
        assert!(!roles.admits("user"));
        assert!(!roles.admits("Admin"));
    }

    #[test]
    fn bearer_prefix_is_required() {
        for value in ["Basic abc", "bearer abc", "Bearer ", "abc"] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
            assert_eq!(bearer_token(&headers), None, "{value} should be rejected");
        }

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
