//! Core trait and error type for key-value storage backends.

/// Errors a storage backend can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The backend has no room left for the write.
  #[error("storage quota exceeded")]
  QuotaExceeded,
  /// Any other backend failure (I/O, SQL, poisoned lock...).
  #[error("storage backend error: {0}")]
  Backend(String),
}

/// A string-keyed, string-valued persistent store.
pub trait KeyValueStore: Send + Sync {
  /// Read the value stored under `key`.
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

  /// Insert or replace the value stored under `key`.
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

  /// Remove `key`. Removing a missing key is not an error.
  fn remove(&self, key: &str) -> Result<(), StoreError>;

  /// All keys starting with `prefix`, in ascending order.
  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
