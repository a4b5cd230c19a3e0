//! # storefront-auth
//!
//! Authentication and session lifecycle for the storefront backend.
//!
//! ## Credentials
//!
//! - **Access tokens** are short-lived HS256 tokens carrying the account id and
//!   role. They are never stored and cannot be revoked; their lifetime is the
//!   only bound.
//! - **Sessions** are long-lived and stored server-side. The client holds a
//!   random refresh token in an `HttpOnly` cookie scoped to `/auth`; the store
//!   keeps only its SHA-256. Each session also has a public UUID handle used
//!   for listing and revocation, which is not a credential. Refreshing a
//!   session deletes it and creates a new one, so every token is single use.
//!
//! ## External login
//!
//! Third-party login uses the OAuth authorization-code flow with PKCE. The
//! `state`/verifier pair lives in a process-local cache with a short TTL and a
//! background janitor; a callback redeems its entry exactly once.
//!
//! ## Storage
//!
//! Accounts and sessions are reached through the [`accounts::AccountDirectory`]
//! and [`session::SessionStore`] traits. PostgreSQL implementations back the
//! server; in-memory implementations back tests and local experiments.

pub mod accounts;
pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod oauth;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
