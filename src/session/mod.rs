//! Per-session conversation memory.
//!
//! The orchestrator only talks to [`SessionStore`]; the in-memory and sqlite
//! backends are interchangeable behind it.

mod locks;
mod memory;
mod sqlite;
mod store;
mod types;

pub use locks::TurnLocks;
pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use store::{SessionError, SessionStore};
pub use types::{Role, Session, Turn};
