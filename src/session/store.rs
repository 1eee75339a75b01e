use async_trait::async_trait;
use thiserror::Error;

use super::types::{Session, Turn};
use crate::core::errors::ApiError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::internal(err)
    }
}

/// Keyed store of ordered conversation turns.
///
/// Implementations must keep turns in arrival order and never expose one
/// session's turns under another key. Sessions are created lazily and live
/// until [`SessionStore::delete`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session, creating an empty one for an unseen key.
    async fn get_or_create(&self, key: &str) -> Result<Session, SessionError>;

    /// Appends one turn atomically.
    async fn append(&self, key: &str, turn: Turn) -> Result<(), SessionError>;

    /// Most recent `max_turns` turns, oldest first. `None` returns everything.
    async fn history(&self, key: &str, max_turns: Option<usize>) -> Result<Vec<Turn>, SessionError>;

    /// Removes the whole session. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, SessionError>;

    /// Number of live sessions.
    async fn count(&self) -> Result<usize, SessionError>;

    fn name(&self) -> &str;
}
