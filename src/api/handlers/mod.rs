//! API handlers for the storefront auth service.

pub mod auth;
pub mod health;
pub mod me;
