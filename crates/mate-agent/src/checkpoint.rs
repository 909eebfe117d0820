//! Per-thread conversation checkpoints.
//!
//! Each thread's full message history is stored as one JSON payload keyed by
//! thread id, so a conversation picks up where it left off across restarts.

use crate::message::TurnMessage;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("sqlite error: {source}")]
    Sql {
        #[from]
        source: rusqlite::Error,
    },
    #[error("json serialization error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("checkpoint lock poisoned")]
    Poisoned,
}

/// History persistence seam. `load` of an unknown thread returns an empty
/// history rather than an error.
pub trait Checkpointer: Send + Sync {
    fn load(&self, thread_id: &str) -> Result<Vec<TurnMessage>, CheckpointError>;
    fn save(&self, thread_id: &str, messages: &[TurnMessage]) -> Result<(), CheckpointError>;
}

#[derive(Debug)]
pub struct SqliteCheckpointer {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, CheckpointError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn migrate(&self) -> Result<(), CheckpointError> {
        let conn = self.conn.lock().map_err(|_| CheckpointError::Poisoned)?;
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT PRIMARY KEY,
    payload_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
        )?;
        Ok(())
    }
}

impl Checkpointer for SqliteCheckpointer {
    fn load(&self, thread_id: &str) -> Result<Vec<TurnMessage>, CheckpointError> {
        let conn = self.conn.lock().map_err(|_| CheckpointError::Poisoned)?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, thread_id: &str, messages: &[TurnMessage]) -> Result<(), CheckpointError> {
        let payload = serde_json::to_string(messages)?;
        let conn = self.conn.lock().map_err(|_| CheckpointError::Poisoned)?;
        conn.execute(
            r#"
INSERT INTO checkpoints (thread_id, payload_json, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(thread_id) DO UPDATE SET
  payload_json = excluded.payload_json,
  updated_at = excluded.updated_at
"#,
            params![thread_id, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// In-process checkpointer for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    threads: Mutex<HashMap<String, Vec<TurnMessage>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn load(&self, thread_id: &str) -> Result<Vec<TurnMessage>, CheckpointError> {
        let threads = self.threads.lock().map_err(|_| CheckpointError::Poisoned)?;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    fn save(&self, thread_id: &str, messages: &[TurnMessage]) -> Result<(), CheckpointError> {
        let mut threads = self.threads.lock().map_err(|_| CheckpointError::Poisoned)?;
        threads.insert(thread_id.to_string(), messages.to_vec());
        Ok(())
    }
}
