//! Refresh sessions: storage and lifecycle.

pub mod memory;
pub mod models;
pub mod repo;
pub mod service;
pub mod token;

pub use memory::MemorySessionStore;
pub use models::{ClientMeta, NewSession, Session, SessionId, SessionRecord};
pub use repo::{PgSessionStore, SessionStore};
pub use service::{IssuedSession, RegisterAccount, SessionService};
pub use token::{generate_session_token, hash_session_token};
