use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::store::{SessionError, SessionStore};
use super::types::{Session, Turn};

type TurnLog = Arc<Mutex<Vec<Turn>>>;

/// Process-lifetime store. Each session owns its own lock, so appends on
/// different keys never wait on each other beyond the brief map lookup.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, TurnLog>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn log_for(&self, key: &str) -> TurnLog {
        if let Some(log) = self.sessions.read().await.get(key) {
            return log.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    async fn existing_log(&self, key: &str) -> Option<TurnLog> {
        self.sessions.read().await.get(key).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, key: &str) -> Result<Session, SessionError> {
        let log = self.log_for(key).await;
        let turns = log.lock().await.clone();
        Ok(Session {
            key: key.to_string(),
            turns,
        })
    }

    async fn append(&self, key: &str, turn: Turn) -> Result<(), SessionError> {
        let log = self.log_for(key).await;
        log.lock().await.push(turn);
        Ok(())
    }

    async fn history(&self, key: &str, max_turns: Option<usize>) -> Result<Vec<Turn>, SessionError> {
        let Some(log) = self.existing_log(key).await else {
            return Ok(Vec::new());
        };
        let turns = log.lock().await;
        let start = match max_turns {
            Some(limit) => turns.len().saturating_sub(limit),
            None => 0,
        };
        Ok(turns[start..].to_vec())
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionError> {
        Ok(self.sessions.write().await.remove(key).is_some())
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().await.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[tokio::test]
    async fn nth_append_is_nth_in_history() {
        let store = InMemorySessionStore::new();
        for i in 0..5 {
            store
                .append("s", Turn::user(format!("m{}", i)))
                .await
                .expect("append");
        }
        let history = store.history("s", None).await.expect("history");
        let contents: Vec<_> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn windowed_history_returns_most_recent_oldest_first() {
        let store = InMemorySessionStore::new();
        for i in 0..10 {
            store
                .append("s", Turn::user(format!("m{}", i)))
                .await
                .expect("append");
        }
        let window = store.history("s", Some(6)).await.expect("history");
        assert_eq!(window.len(), 6);
        assert_eq!(window.first().map(|t| t.content.as_str()), Some("m4"));
        assert_eq!(window.last().map(|t| t.content.as_str()), Some("m9"));

        let all = store.history("s", None).await.expect("history");
        assert_eq!(all.len(), 10);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        store.append("a", Turn::user("for a")).await.expect("append");
        store.append("b", Turn::assistant("for b")).await.expect("append");

        let a = store.history("a", None).await.expect("history");
        let b = store.history("b", None).await.expect("history");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "for a");
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn get_or_create_is_lazy_and_history_does_not_create() {
        let store = InMemorySessionStore::new();
        assert!(store.history("ghost", Some(3)).await.expect("history").is_empty());
        assert_eq!(store.count().await.expect("count"), 0);

        let session = store.get_or_create("new").await.expect("create");
        assert!(session.turns.is_empty());
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = InMemorySessionStore::new();
        store.append("s", Turn::user("x")).await.expect("append");
        assert!(store.delete("s").await.expect("delete"));
        assert!(!store.delete("s").await.expect("delete"));
        assert!(store.history("s", None).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_on_one_key_are_all_kept() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append("shared", Turn::user(format!("m{}", i)))
                    .await
                    .expect("append");
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }
        assert_eq!(store.history("shared", None).await.expect("history").len(), 32);
    }
}
