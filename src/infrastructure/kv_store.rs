use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Durable key-value persistence. Every call completes its write before returning.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, InfraError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), InfraError>;
    fn remove(&self, key: &str) -> Result<(), InfraError>;

    fn get_or(&self, key: &str, default: Value) -> Result<Value, InfraError> {
        Ok(self.get(key)?.unwrap_or(default))
    }
}

fn normalized_key(key: &str) -> Option<String> {
    let normalized = key.trim();
    if normalized.is_empty() {
        return None;
    }
    Some(normalized.to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, Value>>,
}

impl InMemoryKeyValueStore {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Value>>, InfraError> {
        self.values
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("key-value store: {error}")))
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, InfraError> {
        let Some(key) = normalized_key(key) else {
            return Ok(None);
        };
        Ok(self.lock()?.get(&key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), InfraError> {
        let key = normalized_key(key)
            .ok_or_else(|| InfraError::InvalidConfig("key is required for save".to_string()))?;
        self.lock()?.insert(key, value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let Some(key) = normalized_key(key) else {
            return Ok(());
        };
        self.lock()?.remove(&key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    db_path: PathBuf,
}

impl SqliteKeyValueStore {
    /// Opens the database at `db_path`, creating the schema when missing.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, InfraError> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
        };
        store.connect()?.execute_batch(SCHEMA_SQL)?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, InfraError> {
        let Some(key) = normalized_key(key) else {
            return Ok(None);
        };
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(InfraError::from))
            .transpose()
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), InfraError> {
        let key = normalized_key(key)
            .ok_or_else(|| InfraError::InvalidConfig("key is required for save".to_string()))?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let Some(key) = normalized_key(key) else {
            return Ok(());
        };
        let connection = self.connect()?;
        connection.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Store wrapper whose reads can be switched to fail, for exercising error paths.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, Default)]
    pub(crate) struct UnreliableStore {
        inner: InMemoryKeyValueStore,
        fail_reads: AtomicBool,
    }

    impl UnreliableStore {
        pub(crate) fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }
    }

    impl KeyValueStore for UnreliableStore {
        fn get(&self, key: &str) -> Result<Option<Value>, InfraError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(InfraError::Io(std::io::Error::other("disk unavailable")));
            }
            self.inner.get(key)
        }

        fn save(&self, key: &str, value: &Value) -> Result<(), InfraError> {
            self.inner.save(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), InfraError> {
            self.inner.remove(key)
        }
    }
}
