//! Durable key-value collaborator.
//!
//! The engine never touches storage directly; it goes through
//! [`KeyValueStore`] so the backing medium can be swapped out. Production
//! uses [`SqliteStore`]; tests and embedders with their own durability can
//! use [`MemoryStore`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use log::info;
use rusqlite::Connection;
use serde_json::Value;

use crate::error::{PunchrError, Result};

/// Abstract durable key-value storage with JSON values.
///
/// Any I/O failure surfaces as `StoreUnavailable`; callers treat it as
/// transient and must not assume the write did or did not land, so retries
/// have to be idempotent.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
    /// All entries, for prefix scans and debug dumps.
    async fn entries(&self) -> Result<Vec<(String, Value)>>;
}

/// In-memory store backed by a HashMap.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.map
            .lock()
            .map_err(|_| PunchrError::StoreUnavailable("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, Value)>> {
        let mut entries: Vec<_> = self
            .lock()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

/// SQLite-backed store: a single `kv` table with JSON text values.
pub struct SqliteStore {
    db: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store in the default profile directory
    /// (`<data-local-dir>/punchr/punchr.db`).
    pub fn open() -> Result<Self> {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("punchr");
        Self::open_at(&dir)
    }

    /// Open or create the store under the given directory.
    ///
    /// Useful for testing with custom paths.
    pub fn open_at(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("punchr.db");

        let db = Connection::open(&path).map_err(store_err)?;
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(store_err)?;

        info!("Opened store at {}", path.display());
        Ok(Self { db: Mutex::new(db), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| PunchrError::StoreUnavailable("sqlite connection poisoned".to_string()))
    }
}

fn store_err(e: rusqlite::Error) -> PunchrError {
    PunchrError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let db = self.lock()?;
        let result = db.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
            let json: String = row.get(0)?;
            Ok(json)
        });

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let json = serde_json::to_string(&value)?;
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, json],
            )
            .map_err(store_err)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .map_err(store_err)?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, Value)>> {
        let db = self.lock()?;
        let mut stmt = db
            .prepare("SELECT key, value FROM kv ORDER BY key")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let json: String = row.get(1)?;
                Ok((key, json))
            })
            .map_err(store_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, json) = row.map_err(store_err)?;
            entries.push((key, serde_json::from_str(&json)?));
        }
        Ok(entries)
    }
}
