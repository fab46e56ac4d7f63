//! Settings key-value store
//!
//! Persistence is injected into the history and credential stores through
//! [`KeyValueStore`]. Production uses the SQLite `settings` table; tests use
//! [`MemoryStore`].

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{Error, Result};

/// Durable string slots addressed by fixed keys
///
/// Every write replaces the whole value for its key in one statement, so a
/// reader never observes a partially written value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a slot; `None` when the key was never written or was removed
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace a slot's value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a slot (no error if absent)
    async fn remove(&self, key: &str) -> Result<()>;
}

/// [`KeyValueStore`] backed by the SQLite `settings` table
#[derive(Clone)]
pub struct SqliteSettingsStore {
    db: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.db)
                .await
                .map_err(Error::Database)?;

        // A NULL value is treated the same as a missing row
        Ok(row.and_then(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }
}

/// In-memory [`KeyValueStore`] for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
