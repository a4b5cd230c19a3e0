//! Account directory: the user-record store the session core reads from.

pub mod memory;
pub mod models;
pub mod repo;

pub use memory::MemoryAccountDirectory;
pub use models::{Account, AccountId, CreateOutcome, NewAccount, ROLE_ADMIN, ROLE_USER};
pub use repo::{AccountDirectory, PgAccountDirectory};

/// Normalize an email for lookup and uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
