//! Persistent face id → display name mapping backed by SQLite.

use crate::types::IdentityRecord;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    face_id      TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Remembered visitors, keyed by the face id issued at registration.
///
/// Empty face ids, and empty names on `set`, are rejected: the call logs a
/// warning and returns without touching storage.
pub trait IdentityStore {
    fn get(&self, face_id: &str) -> Result<Option<String>, StoreError>;

    /// Insert or replace the name for `face_id`.
    fn set(&mut self, face_id: &str, name: &str) -> Result<(), StoreError>;

    /// Forget `face_id`. Returns whether a record existed.
    fn delete(&mut self, face_id: &str) -> Result<bool, StoreError>;
}

pub struct SqliteIdentityStore {
    conn: Connection,
}

impl SqliteIdentityStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened identity store");
        Self::init(conn)
    }

    /// Volatile store, lost when dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// All records, oldest first.
    pub fn list(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT face_id, display_name, created_at FROM identities
             ORDER BY created_at, face_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IdentityRecord {
                face_id: row.get(0)?,
                display_name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl IdentityStore for SqliteIdentityStore {
    fn get(&self, face_id: &str) -> Result<Option<String>, StoreError> {
        if face_id.is_empty() {
            tracing::warn!("identity lookup rejected: empty face id");
            return Ok(None);
        }
        let name = self
            .conn
            .query_row(
                "SELECT display_name FROM identities WHERE face_id = ?1",
                params![face_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name)
    }

    fn set(&mut self, face_id: &str, name: &str) -> Result<(), StoreError> {
        if face_id.is_empty() || name.trim().is_empty() {
            tracing::warn!(face_id, name, "identity write rejected: empty face id or name");
            return Ok(());
        }
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO identities (face_id, display_name, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(face_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 created_at = excluded.created_at",
            params![face_id, name, now],
        )?;
        tracing::debug!(face_id, name, "identity stored");
        Ok(())
    }

    fn delete(&mut self, face_id: &str) -> Result<bool, StoreError> {
        if face_id.is_empty() {
            tracing::warn!("identity delete rejected: empty face id");
            return Ok(false);
        }
        let removed = self
            .conn
            .execute("DELETE FROM identities WHERE face_id = ?1", params![face_id])?;
        tracing::debug!(face_id, removed, "identity deleted");
        Ok(removed > 0)
    }
}
