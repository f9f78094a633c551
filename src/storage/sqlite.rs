//! SQLite storage backend for adjacency records

use super::traits::{storage_key, OpenStore, RecordStore, StorageError, StorageResult};
use crate::record::AdjacencyRecord;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed record store
///
/// One `records` table keyed by token, holding each record's JSON plus its
/// model, provenance and download time as plain columns for inspection.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                token TEXT PRIMARY KEY,
                model TEXT NOT NULL,
                source TEXT NOT NULL,
                downloaded_at TEXT NOT NULL,
                record_json TEXT NOT NULL
            );

            -- Concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    /// Create an in-memory store (useful for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: ":memory:".to_string(),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let location = path.as_ref().display().to_string();
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }
}

impl RecordStore for SqliteStore {
    fn load(&self, token: &str) -> StorageResult<Option<AdjacencyRecord>> {
        let key = storage_key(token)?;
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM records WHERE token = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &AdjacencyRecord) -> StorageResult<String> {
        let key = storage_key(&record.token)?;
        let mut stored = record.clone();
        stored.token = key.clone();
        let json = serde_json::to_string(&stored)?;
        let source = serde_json::to_value(stored.meta.source)?
            .as_str()
            .unwrap_or_default()
            .to_string();

        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO records (token, model, source, downloaded_at, record_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key,
                stored.model,
                source,
                stored.meta.downloaded_at.to_rfc3339(),
                json
            ],
        )?;
        Ok(format!("{}#{}", self.location, key))
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT token FROM records ORDER BY token")?;
        let tokens = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    fn delete(&self, token: &str) -> StorageResult<bool> {
        let key = storage_key(token)?;
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM records WHERE token = ?1", params![key])?;
        Ok(rows > 0)
    }
}
