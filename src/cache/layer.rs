//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::CacheResult;
use crate::codeforces::path_references_handle;
use crate::store::KeyValueStore;

/// Key namespace for cached API responses.
pub const CACHE_PREFIX: &str = "cf_api_cache:";

/// How many entries to drop when the store reports it is full.
const EVICTION_BATCH: usize = 5;

/// Stored form of a cached response.
#[derive(Debug, Serialize, Deserialize)]
struct CachedEntry {
  timestamp: DateTime<Utc>,
  data: Value,
}

fn cache_key(path: &str) -> String {
  format!("{}{}", CACHE_PREFIX, path)
}

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the API client and its callers. The raw `result`
/// payload is what gets stored, so a cache hit decodes exactly the bytes a
/// network fetch returned.
pub struct CacheLayer<S: KeyValueStore> {
  storage: Arc<S>,
  /// How long a cached response is served before refetching
  ttl: Duration,
}

impl<S: KeyValueStore> CacheLayer<S> {
  /// Create a new cache layer over the given store.
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      ttl: Duration::hours(3),
    }
  }

  /// Set the time-to-live for cached responses.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  fn is_fresh(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at < self.ttl
  }

  /// Fetch with a cache-first strategy.
  ///
  /// 1. With `force`, drop any entry for `path` first
  /// 2. Otherwise return a fresh entry without calling `fetcher`
  /// 3. Call `fetcher`; errors propagate untouched and nothing is cached
  /// 4. Cache the raw result, then return it decoded
  pub async fn fetch<T, E, F, Fut>(
    &self,
    path: &str,
    force: bool,
    fetcher: F,
  ) -> Result<CacheResult<T>, E>
  where
    T: DeserializeOwned,
    E: From<serde_json::Error>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
  {
    let key = cache_key(path);

    if force {
      debug!(path, "Force refresh, dropping cache entry");
      self.remove_quietly(&key);
    } else if let Some(entry) = self.lookup(&key) {
      match T::deserialize(&entry.data) {
        Ok(data) => return Ok(CacheResult::from_cache(data, entry.timestamp)),
        Err(e) => {
          warn!(path, error = %e, "Cached response has unexpected shape, refetching");
          self.remove_quietly(&key);
        }
      }
    }

    let raw = fetcher().await?;
    let data = T::deserialize(&raw)?;
    self.store(&key, raw);

    Ok(CacheResult::from_network(data))
  }

  /// Read a fresh entry, removing it when expired or unreadable.
  fn lookup(&self, key: &str) -> Option<CachedEntry> {
    let text = match self.storage.get(key) {
      Ok(Some(text)) => text,
      Ok(None) => return None,
      Err(e) => {
        warn!(key, error = %e, "Failed to read cache entry");
        return None;
      }
    };

    let entry: CachedEntry = match serde_json::from_str(&text) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(key, error = %e, "Failed to parse cache entry, removing it");
        self.remove_quietly(key);
        return None;
      }
    };

    if self.is_fresh(entry.timestamp) {
      Some(entry)
    } else {
      debug!(key, "Cache entry expired");
      self.remove_quietly(key);
      None
    }
  }

  /// Persist a fetched payload. Failures are logged, never returned.
  fn store(&self, key: &str, data: Value) {
    let entry = CachedEntry {
      timestamp: Utc::now(),
      data,
    };
    let text = match serde_json::to_string(&entry) {
      Ok(text) => text,
      Err(e) => {
        warn!(key, error = %e, "Failed to serialize cache entry");
        return;
      }
    };

    if let Err(e) = self.storage.set(key, &text) {
      warn!(key, error = %e, "Failed to save cache entry, evicting old entries");
      self.evict(key, EVICTION_BATCH);

      if let Err(e) = self.storage.set(key, &text) {
        warn!(key, error = %e, "Failed to save cache entry again");
      }
    }
  }

  /// Drop up to `count` cache entries other than `keep`.
  fn evict(&self, keep: &str, count: usize) {
    let keys = match self.storage.keys_with_prefix(CACHE_PREFIX) {
      Ok(keys) => keys,
      Err(e) => {
        warn!(error = %e, "Failed to list cache entries for eviction");
        return;
      }
    };

    for key in keys.iter().filter(|k| k.as_str() != keep).take(count) {
      self.remove_quietly(key);
    }
  }

  fn remove_quietly(&self, key: &str) {
    if let Err(e) = self.storage.remove(key) {
      warn!(key, error = %e, "Failed to remove cache entry");
    }
  }

  /// Drop the entry for one endpoint path.
  pub fn invalidate(&self, path: &str) {
    self.remove_quietly(&cache_key(path));
  }

  /// Drop every entry whose endpoint queries `handle`. Returns how many were removed.
  pub fn invalidate_handle(&self, handle: &str) -> usize {
    self.remove_matching(|path| path_references_handle(path, handle))
  }

  /// Drop the whole cache namespace. Returns how many entries were removed.
  pub fn clear(&self) -> usize {
    self.remove_matching(|_| true)
  }

  fn remove_matching(&self, predicate: impl Fn(&str) -> bool) -> usize {
    let keys = match self.storage.keys_with_prefix(CACHE_PREFIX) {
      Ok(keys) => keys,
      Err(e) => {
        warn!(error = %e, "Failed to list cache entries");
        return 0;
      }
    };

    let mut removed = 0;
    for key in keys {
      let path = &key[CACHE_PREFIX.len()..];
      if predicate(path) {
        self.remove_quietly(&key);
        removed += 1;
      }
    }

    if removed > 0 {
      debug!(removed, "Invalidated cache entries");
    }
    removed
  }
}

impl<S: KeyValueStore> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl: self.ttl,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::codeforces::ApiError;
  use crate::store::MemoryStore;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn layer() -> (Arc<MemoryStore>, CacheLayer<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), CacheLayer::new(store))
  }

  async fn fetch_counted(
    cache: &CacheLayer<MemoryStore>,
    path: &str,
    force: bool,
    calls: &AtomicUsize,
    value: Value,
  ) -> Result<CacheResult<Value>, ApiError> {
    cache
      .fetch(path, force, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
      })
      .await
  }

  #[tokio::test]
  async fn test_second_fetch_served_from_cache() {
    let (_store, cache) = layer();
    let calls = AtomicUsize::new(0);

    let first = fetch_counted(&cache, "user.rating?handle=a", false, &calls, json!([1]))
      .await
      .unwrap();
    let second = fetch_counted(&cache, "user.rating?handle=a", false, &calls, json!([2]))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(
      serde_json::to_vec(&first.data).unwrap(),
      serde_json::to_vec(&second.data).unwrap()
    );
  }

  #[tokio::test]
  async fn test_force_bypasses_and_repopulates() {
    let (_store, cache) = layer();
    let calls = AtomicUsize::new(0);

    fetch_counted(&cache, "user.info?handles=a", false, &calls, json!("old"))
      .await
      .unwrap();
    let forced = fetch_counted(&cache, "user.info?handles=a", true, &calls, json!("new"))
      .await
      .unwrap();
    assert_eq!(forced.source, CacheSource::Network);
    assert_eq!(forced.data, json!("new"));

    let cached = fetch_counted(&cache, "user.info?handles=a", false, &calls, json!("newer"))
      .await
      .unwrap();
    assert_eq!(cached.source, CacheSource::Cache);
    assert_eq!(cached.data, json!("new"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched() {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheLayer::new(store.clone()).with_ttl(Duration::zero());
    let calls = AtomicUsize::new(0);

    fetch_counted(&cache, "p", false, &calls, json!(1)).await.unwrap();
    let again = fetch_counted(&cache, "p", false, &calls, json!(2)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(again.data, json!(2));
  }

  #[tokio::test]
  async fn test_old_timestamp_treated_as_absent() {
    let (store, cache) = layer();
    let stale = json!({
      "timestamp": (Utc::now() - Duration::hours(4)).to_rfc3339(),
      "data": "stale"
    });
    store.set(&cache_key("p"), &stale.to_string()).unwrap();
    let calls = AtomicUsize::new(0);

    let result = fetch_counted(&cache, "p", false, &calls, json!("fresh"))
      .await
      .unwrap();

    assert_eq!(result.data, json!("fresh"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_errors_propagate_and_are_not_cached() {
    let (store, cache) = layer();

    let result: Result<CacheResult<Value>, ApiError> = cache
      .fetch("p", false, || async {
        Err(ApiError::Remote("Call limit exceeded".to_string()))
      })
      .await;

    assert_eq!(
      result.unwrap_err(),
      ApiError::Remote("Call limit exceeded".to_string())
    );
    assert_eq!(store.len(), 0);
  }

  #[tokio::test]
  async fn test_corrupt_entry_removed_and_refetched() {
    let (store, cache) = layer();
    store.set(&cache_key("p"), "{not json").unwrap();
    let calls = AtomicUsize::new(0);

    let result = fetch_counted(&cache, "p", false, &calls, json!(5)).await.unwrap();

    assert_eq!(result.data, json!(5));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_full_store_evicts_and_retries() {
    let store = Arc::new(MemoryStore::with_capacity(3));
    store.set("students", "[]").unwrap();
    let cache = CacheLayer::new(store.clone());
    let calls = AtomicUsize::new(0);

    fetch_counted(&cache, "a", false, &calls, json!(1)).await.unwrap();
    fetch_counted(&cache, "b", false, &calls, json!(2)).await.unwrap();
    // Store is now full; this write must evict cache entries and succeed
    fetch_counted(&cache, "c", false, &calls, json!(3)).await.unwrap();

    assert!(store.get(&cache_key("c")).unwrap().is_some());
    assert!(store.get(&cache_key("a")).unwrap().is_none());
    assert_eq!(store.get("students").unwrap().as_deref(), Some("[]"));
  }

  #[tokio::test]
  async fn test_failed_cache_write_still_returns_data() {
    let (store, cache) = layer();
    store.fail_writes(true);
    let calls = AtomicUsize::new(0);

    let result = fetch_counted(&cache, "p", false, &calls, json!("ok")).await.unwrap();

    assert_eq!(result.data, json!("ok"));
    assert_eq!(store.len(), 0);
  }

  #[tokio::test]
  async fn test_invalidate_handle() {
    let (store, cache) = layer();
    let calls = AtomicUsize::new(0);
    for path in [
      "user.info?handles=Alice",
      "user.rating?handle=alice",
      "user.status?handle=alice&from=1&count=50",
      "user.rating?handle=bob",
    ] {
      fetch_counted(&cache, path, false, &calls, json!([])).await.unwrap();
    }

    assert_eq!(cache.invalidate_handle("ALICE"), 3);
    assert_eq!(
      store.keys_with_prefix(CACHE_PREFIX).unwrap(),
      vec![cache_key("user.rating?handle=bob")]
    );

    cache.invalidate("user.rating?handle=bob");
    assert_eq!(cache.clear(), 0);
  }

  #[tokio::test]
  async fn test_clear_leaves_other_keys() {
    let (store, cache) = layer();
    store.set("students", "[]").unwrap();
    let calls = AtomicUsize::new(0);
    fetch_counted(&cache, "x", false, &calls, json!(1)).await.unwrap();

    assert_eq!(cache.clear(), 1);
    assert_eq!(store.len(), 1);
  }
}
