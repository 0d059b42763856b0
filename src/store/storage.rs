//! Key/value persistence backends for the stores.
//!
//! Stores only see the [`StateStorage`] capability. Which backend sits behind
//! it is decided once by [`open_storage`], based on configuration.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("storage database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("invalid storage key {0:?}")]
  InvalidKey(String),

  #[error("storage lock poisoned")]
  Poisoned,
}

/// Capability for reading and writing serialized state by key.
pub trait StateStorage: Send + Sync {
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

  fn remove_item(&self, key: &str) -> Result<(), StorageError>;

  /// Short backend name for logs.
  fn name(&self) -> &'static str;
}

/// Volatile storage. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
  items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StateStorage for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
    items.remove(key);
    Ok(())
  }

  fn name(&self) -> &'static str {
    "memory"
  }
}

/// Memory storage whose writes of values containing `marker` take `delay`.
#[cfg(test)]
pub(crate) struct SlowStorage {
  pub inner: MemoryStorage,
  pub marker: &'static str,
  pub delay: std::time::Duration,
}

#[cfg(test)]
impl StateStorage for SlowStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    self.inner.get_item(key)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    if value.contains(self.marker) {
      std::thread::sleep(self.delay);
    }
    self.inner.set_item(key, value)
  }

  fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    self.inner.remove_item(key)
  }

  fn name(&self) -> &'static str {
    "slow"
  }
}

/// One JSON file per key inside a directory.
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  /// Open (and create if needed) the storage directory.
  pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
    let dir = dir.into();
    std::fs::create_dir_all(&dir)?;
    Ok(Self { dir })
  }

  fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
    let valid = !key.is_empty()
      && key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
      return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(self.dir.join(format!("{}.json", key)))
  }
}

impl StateStorage for FileStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let path = self.path_for(key)?;
    match std::fs::read_to_string(&path) {
      Ok(contents) => Ok(Some(contents)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let path = self.path_for(key)?;
    // Write to a sibling file first so a crash never leaves a torn value
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, value)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    let path = self.path_for(key)?;
    match std::fs::remove_file(&path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  fn name(&self) -> &'static str {
    "file"
  }
}

/// SQLite-based key/value storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the key/value table.
const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStorage {
  /// Open or create the database at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// In-memory database, mostly useful for tests.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StorageError> {
    conn.execute_batch(STORAGE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

impl StateStorage for SqliteStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
    let value = conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
    conn.execute(
      "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
       VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
    conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
    Ok(())
  }

  fn name(&self) -> &'static str {
    "sqlite"
  }
}

/// Default directory for persisted state.
pub fn default_data_dir() -> Option<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|dir| dir.join("flx"))
}

/// Select and open the configured backend.
///
/// A backend that cannot be opened is replaced by [`MemoryStorage`]; the
/// session then lives for this process only.
pub fn open_storage(config: &StorageConfig) -> Arc<dyn StateStorage> {
  let dir = config.path.clone().or_else(default_data_dir);

  let opened: Result<Arc<dyn StateStorage>, StorageError> = match (config.backend, dir) {
    (StorageBackend::Memory, _) => return Arc::new(MemoryStorage::new()),
    (StorageBackend::File, Some(dir)) => {
      FileStorage::open(dir.join("state")).map(|s| Arc::new(s) as Arc<dyn StateStorage>)
    }
    (StorageBackend::Sqlite, Some(dir)) => {
      SqliteStorage::open(&dir.join("state.db")).map(|s| Arc::new(s) as Arc<dyn StateStorage>)
    }
    (_, None) => Err(StorageError::Io(std::io::Error::new(
      std::io::ErrorKind::NotFound,
      "could not determine data directory",
    ))),
  };

  match opened {
    Ok(storage) => {
      tracing::debug!(backend = storage.name(), "opened state storage");
      storage
    }
    Err(e) => {
      tracing::warn!(
        backend = ?config.backend,
        error = %e,
        "state storage unavailable, falling back to in-memory storage"
      );
      Arc::new(MemoryStorage::new())
    }
  }
}
