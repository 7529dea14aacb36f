//! In-memory store used by tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::traits::{KeyValueStore, StoreError};

/// In-memory key-value store with an optional entry quota.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<BTreeMap<String, String>>,
  /// Maximum number of keys; writes adding a new key beyond it fail.
  capacity: Option<usize>,
  /// When set, every write fails.
  read_only: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      capacity: Some(capacity),
      ..Self::default()
    }
  }

  /// Make every subsequent `set`/`remove` fail.
  pub fn fail_writes(&self, fail: bool) {
    self.read_only.store(fail, Ordering::SeqCst);
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap().len()
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    Ok(self.entries.lock().unwrap().get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    if self.read_only.load(Ordering::SeqCst) {
      return Err(StoreError::Backend("store is read-only".to_string()));
    }

    let mut entries = self.entries.lock().unwrap();
    if let Some(capacity) = self.capacity {
      if !entries.contains_key(key) && entries.len() >= capacity {
        return Err(StoreError::QuotaExceeded);
      }
    }
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    if self.read_only.load(Ordering::SeqCst) {
      return Err(StoreError::Backend("store is read-only".to_string()));
    }

    self.entries.lock().unwrap().remove(key);
    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
    Ok(
      self
        .entries
        .lock()
        .unwrap()
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}
