//! SQLite-backed session store.
//!
//! Same contract as the in-memory store, but turns survive restarts.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::store::{SessionError, SessionStore};
use super::types::{Role, Session, Turn};

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

fn storage_err<E: std::fmt::Display>(err: E) -> SessionError {
    SessionError::Storage(err.to_string())
}

impl SqliteSessionStore {
    pub async fn new(db_path: &Path) -> Result<Self, SessionError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to open session db: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), SessionError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("Failed to init sessions table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("Failed to init turns table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_session_id ON turns(session_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, SessionError> {
        let role_raw: String = row.try_get("role").map_err(storage_err)?;
        let role = Role::parse(&role_raw)
            .ok_or_else(|| SessionError::Storage(format!("Unknown role in db: {}", role_raw)))?;
        let content: String = row.try_get("content").map_err(storage_err)?;
        let created_raw: String = row.try_get("created_at").map_err(storage_err)?;
        let created_at = DateTime::parse_from_rfc3339(&created_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Ok(Turn {
            role,
            content,
            created_at,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get_or_create(&self, key: &str) -> Result<Session, SessionError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        let turns = self.history(key, None).await?;
        Ok(Session {
            key: key.to_string(),
            turns,
        })
    }

    async fn append(&self, key: &str, turn: Turn) -> Result<(), SessionError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        sqlx::query("INSERT INTO turns (session_id, role, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(key)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn history(&self, key: &str, max_turns: Option<usize>) -> Result<Vec<Turn>, SessionError> {
        let rows = match max_turns {
            Some(limit) => sqlx::query(
                "SELECT * FROM (SELECT * FROM turns WHERE session_id = ? ORDER BY id DESC LIMIT ?) ORDER BY id ASC",
            )
            .bind(key)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?,
            None => sqlx::query("SELECT * FROM turns WHERE session_id = ? ORDER BY id ASC")
                .bind(key)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_err)?,
        };

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, SessionError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get(0))
            .map_err(storage_err)?;
        Ok(count.max(0) as usize)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
