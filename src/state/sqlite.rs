//! SQLite-backed state store

use super::{ScopeKey, StateError, StateResult, StateStore, StateWrite};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS state_properties (
    entity_kind TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    property TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    PRIMARY KEY (entity_kind, entity_id, property)
);

CREATE INDEX IF NOT EXISTS idx_state_entity ON state_properties(entity_kind, entity_id);
";

const UPSERT: &str = "INSERT INTO state_properties (entity_kind, entity_id, property, value, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (entity_kind, entity_id, property)
     DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

const DELETE: &str =
    "DELETE FROM state_properties WHERE entity_kind = ?1 AND entity_id = ?2 AND property = ?3";

/// Thread-safe SQLite store handle
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    ///
    /// # Errors
    ///
    /// When the file cannot be opened or the schema cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> StateResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database
    ///
    /// # Errors
    ///
    /// When the schema cannot be created.
    pub fn open_in_memory() -> StateResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StateResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StateResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StateError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    fn write_one(conn: &Connection, key: &ScopeKey, value: Option<&Value>) -> StateResult<()> {
        match value {
            Some(value) => {
                let json = serde_json::to_string(value)?;
                conn.execute(
                    UPSERT,
                    params![
                        key.kind.as_str(),
                        key.entity_id,
                        key.property,
                        json,
                        Utc::now().to_rfc3339()
                    ],
                )?;
            }
            None => {
                conn.execute(DELETE, params![key.kind.as_str(), key.entity_id, key.property])?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load(&self, key: &ScopeKey) -> StateResult<Option<Value>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT value FROM state_properties
                 WHERE entity_kind = ?1 AND entity_id = ?2 AND property = ?3",
                params![key.kind.as_str(), key.entity_id, key.property],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|s| serde_json::from_str(&s).map_err(StateError::from))
            .transpose()
    }

    async fn save(&self, key: &ScopeKey, value: &Value) -> StateResult<()> {
        let conn = self.conn()?;
        Self::write_one(&conn, key, Some(value))
    }

    async fn delete(&self, key: &ScopeKey) -> StateResult<()> {
        let conn = self.conn()?;
        Self::write_one(&conn, key, None)
    }

    async fn commit(&self, writes: &[StateWrite]) -> StateResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for write in writes {
            Self::write_one(&tx, &write.key, write.value.as_ref())?;
        }
        tx.commit()?;
        Ok(())
    }
}
