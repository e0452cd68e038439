//! Session Store Adapter
//!
//! Append-only conversation log keyed by an opaque session id. Two pluggable
//! backends: an in-memory TTL-bounded KV store, and a durable relational
//! store using an embedded SQL engine rather than a hosted RDBMS, since the
//! core has no other network dependency on a database service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Role of a single turn within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

/// A single message in a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: TurnRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl SessionMessage {
    #[must_use]
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }
}

/// A conversation session: append-only once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Session {
    #[must_use]
    pub fn new(metadata: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            metadata,
        }
    }
}

/// Pluggable session persistence. All operations are async because both
/// backends may perform I/O (file-backed sqlite, or in the future a remote
/// KV); the in-memory backend simply never actually suspends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, metadata: Option<serde_json::Value>) -> Result<Session>;
    async fn get(&self, session_id: &str) -> Result<Option<Session>>;
    async fn append_message(&self, session_id: &str, message: SessionMessage) -> Result<bool>;
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Session>>;
    async fn delete(&self, session_id: &str) -> Result<bool>;
}

struct Entry {
    session: Session,
    expires_at: Instant,
}

/// Ephemeral, TTL-bounded in-memory backend. Default TTL mirrors the
/// original's 30-day Redis expiry, though in practice a long-running
/// process will reap entries well before then via `reap_expired`.
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Drop sessions past their TTL. Intended for a periodic background task.
    pub fn reap_expired(&self) {
        let now = Instant::now();
        self.sessions.lock().unwrap().retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, metadata: Option<serde_json::Value>) -> Result<Session> {
        let session = Session::new(metadata);
        let entry = Entry {
            session: session.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.lock().unwrap().insert(session.session_id.clone(), entry);
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let now = Instant::now();
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .filter(|e| e.expires_at > now)
            .map(|e| e.session.clone()))
    }

    async fn append_message(&self, session_id: &str, message: SessionMessage) -> Result<bool> {
        let mut sessions = self.sessions.lock().unwrap();
        let now = Instant::now();
        let Some(entry) = sessions.get_mut(session_id).filter(|e| e.expires_at > now) else {
            return Ok(false);
        };
        entry.session.messages.push(message);
        entry.session.updated_at = Utc::now();
        entry.expires_at = Instant::now() + self.ttl;
        Ok(true)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Session>> {
        let sessions = self.sessions.lock().unwrap();
        let now = Instant::now();
        let mut all: Vec<Session> = sessions.values().filter(|e| e.expires_at > now).map(|e| e.session.clone()).collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.lock().unwrap().remove(session_id).is_some())
    }
}

/// Durable backend over an embedded SQL database (sqlite). Kept as a
/// connection-per-call design since sqlite connections are cheap and this
/// avoids sharing a `rusqlite::Connection` (which is `!Sync`) across tasks.
pub struct SqliteSessionStore {
    path: std::path::PathBuf,
}

impl SqliteSessionStore {
    /// # Errors
    /// Returns an error if the schema cannot be created at `path`.
    pub fn open(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = rusqlite::Connection::open(&path)
            .map_err(|e| CoreError::Session(format!("failed to open session db: {e}")))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                messages TEXT NOT NULL,
                metadata TEXT
            )",
            [],
        )
        .map_err(|e| CoreError::Session(format!("failed to create sessions table: {e}")))?;
        Ok(Self { path })
    }

    fn connection(&self) -> Result<rusqlite::Connection> {
        rusqlite::Connection::open(&self.path)
            .map_err(|e| CoreError::Session(format!("failed to open session db: {e}")))
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
        let messages_json: String = row.get(3)?;
        let metadata_json: Option<String> = row.get(4)?;
        Ok(Session {
            session_id: row.get(0)?,
            created_at: row.get::<_, String>(1)?.parse().unwrap_or_else(|_| Utc::now()),
            updated_at: row.get::<_, String>(2)?.parse().unwrap_or_else(|_| Utc::now()),
            messages: serde_json::from_str(&messages_json).unwrap_or_default(),
            metadata: metadata_json.and_then(|m| serde_json::from_str(&m).ok()),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, metadata: Option<serde_json::Value>) -> Result<Session> {
        let session = Session::new(metadata);
        let conn = self.connection()?;
        let metadata_json = session
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            "INSERT INTO sessions (session_id, created_at, updated_at, messages, metadata) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                session.session_id,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
                serde_json::to_string(&session.messages)?,
                metadata_json,
            ],
        )
        .map_err(|e| CoreError::Session(format!("failed to insert session: {e}")))?;
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT session_id, created_at, updated_at, messages, metadata FROM sessions WHERE session_id = ?1")
            .map_err(|e| CoreError::Session(e.to_string()))?;
        let mut rows = stmt
            .query_map([session_id], Self::row_to_session)
            .map_err(|e| CoreError::Session(e.to_string()))?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e| CoreError::Session(e.to_string()))?)),
            None => Ok(None),
        }
    }

    async fn append_message(&self, session_id: &str, message: SessionMessage) -> Result<bool> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(false);
        };
        session.messages.push(message);
        session.updated_at = Utc::now();

        let conn = self.connection()?;
        let updated = conn
            .execute(
                "UPDATE sessions SET messages = ?1, updated_at = ?2 WHERE session_id = ?3",
                rusqlite::params![
                    serde_json::to_string(&session.messages)?,
                    session.updated_at.to_rfc3339(),
                    session_id,
                ],
            )
            .map_err(|e| CoreError::Session(format!("failed to update session: {e}")))?;
        Ok(updated > 0)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Session>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT session_id, created_at, updated_at, messages, metadata FROM sessions
                 ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(|e| CoreError::Session(e.to_string()))?;
        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt
            .query_map(rusqlite::params![limit as i64, offset as i64], Self::row_to_session)
            .map_err(|e| CoreError::Session(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| CoreError::Session(e.to_string()))
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let conn = self.connection()?;
        let deleted = conn
            .execute("DELETE FROM sessions WHERE session_id = ?1", [session_id])
            .map_err(|e| CoreError::Session(format!("failed to delete session: {e}")))?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_a_session() {
        let store = MemorySessionStore::new(Duration::from_secs(3600));
        let session = store.create(None).await.unwrap();

        let ok = store
            .append_message(&session.session_id, SessionMessage::new(TurnRole::User, "hi"))
            .await
            .unwrap();
        assert!(ok);

        let loaded = store.get(&session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn memory_store_expires_sessions_past_ttl() {
        let store = MemorySessionStore::new(Duration::from_millis(10));
        let session = store.create(None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store.get(&session.session_id).await.unwrap().is_none());
        let appended = store
            .append_message(&session.session_id, SessionMessage::new(TurnRole::User, "late"))
            .await
            .unwrap();
        assert!(!appended);

        store.reap_expired();
        assert!(store.list(20, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_append_to_missing_session_returns_false() {
        let store = MemorySessionStore::new(Duration::from_secs(3600));
        let ok = store
            .append_message("does-not-exist", SessionMessage::new(TurnRole::User, "hi"))
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn sqlite_store_round_trips_a_session() {
        let dir = std::env::temp_dir().join(format!("deepsearch-test-{}", Uuid::new_v4()));
        let store = SqliteSessionStore::open(&dir).unwrap();

        let session = store.create(None).await.unwrap();
        store
            .append_message(&session.session_id, SessionMessage::new(TurnRole::Assistant, "hello"))
            .await
            .unwrap();

        let loaded = store.get(&session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);

        let _ = std::fs::remove_file(&dir);
    }
}
