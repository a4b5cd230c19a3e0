//! Auth handlers and supporting modules.
//!
//! This module exposes password login, session refresh and logout, and the
//! Google authorization-code flow, plus the bearer gate used by member routes.
//!
//! ## Session cookie
//!
//! The refresh token is delivered only as the `refresh_token` cookie
//! (`HttpOnly`, `SameSite=Strict`, `Path=/auth`). Every successful refresh
//! replaces it; every failed refresh and every logout clears it.
//!
//! ## Error envelope
//!
//! Failures render as `{"error": {"code", "message"}}`. All credential
//! failures share the same 401 body so callers cannot tell them apart.

mod error;
pub(crate) mod login;
pub(crate) mod oauth;
pub(crate) mod principal;
pub(crate) mod session;
mod state;
pub(crate) mod types;
mod utils;

pub use principal::{require_auth, require_roles, AllowedRoles};
pub use state::{AuthConfig, AuthState};
