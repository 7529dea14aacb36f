//! SQLite implementation of the key-value store.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::{KeyValueStore, StoreError};

/// SQLite-backed key-value store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  path: PathBuf,
}

impl SqliteStore {
  /// Open (or create) the store at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StoreError::Backend(format!("Failed to create data directory: {}", e))
      })?;
    }

    let conn = Connection::open(&path).map_err(|e| {
      StoreError::Backend(format!(
        "Failed to open database at {}: {}",
        path.display(),
        e
      ))
    })?;

    let store = Self {
      conn: Mutex::new(conn),
      path,
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError::Backend("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("cftrack").join("cftrack.db"))
  }

  /// Location of the database file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn run_migrations(&self) -> Result<(), StoreError> {
    self
      .lock()?
      .execute_batch(SCHEMA)
      .map_err(|e| StoreError::Backend(format!("Failed to run migrations: {}", e)))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Backend(format!("Lock poisoned: {}", e)))
  }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Map rusqlite errors, keeping "disk full" distinguishable for cache eviction.
fn map_sql_error(context: &str, err: rusqlite::Error) -> StoreError {
  match &err {
    rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DiskFull => {
      StoreError::QuotaExceeded
    }
    _ => StoreError::Backend(format!("{}: {}", context, err)),
  }
}

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let conn = self.lock()?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| map_sql_error("Failed to read value", e))
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| map_sql_error("Failed to store value", e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| map_sql_error("Failed to remove value", e))?;

    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT key FROM kv_store
         WHERE substr(key, 1, length(?1)) = ?1
         ORDER BY key",
      )
      .map_err(|e| map_sql_error("Failed to prepare query", e))?;

    let keys = stmt
      .query_map(params![prefix], |row| row.get::<_, String>(0))
      .map_err(|e| map_sql_error("Failed to list keys", e))?
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| map_sql_error("Failed to read key", e))?;

    Ok(keys)
  }
}
