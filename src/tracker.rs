//! Wiring of the tracker's services over one store and one transport.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::debug;

use crate::cache::CacheLayer;
use crate::codeforces::{CachedCodeforcesClient, CodeforcesClient, HttpTransport, Transport};
use crate::config::Config;
use crate::store::{KeyValueStore, SqliteStore};
use crate::students::{RepositoryError, StudentRepository};
use crate::sync::{InactivityNotifier, Reminder, SyncProgress, SyncReport, SyncState, Synchronizer};

/// Result of a full sync followed by an inactivity scan.
#[derive(Debug, Clone)]
pub struct FullSync {
  pub reports: Vec<SyncReport>,
  pub reminders: Vec<Reminder>,
}

/// All services, sharing a store, a cache and an API client.
pub struct Tracker<S: KeyValueStore, T: Transport> {
  pub client: CachedCodeforcesClient<S, T>,
  pub students: StudentRepository<S>,
  pub sync_state: SyncState<S>,
  pub synchronizer: Synchronizer<S, T>,
  pub notifier: InactivityNotifier<S>,
}

impl<S: KeyValueStore, T: Transport> Tracker<S, T> {
  pub fn new(store: Arc<S>, transport: T, config: &Config) -> Self {
    let cache = CacheLayer::new(Arc::clone(&store)).with_ttl(config.codeforces.cache_ttl());
    let client = CachedCodeforcesClient::new(
      CodeforcesClient::new(transport, config.codeforces.request_delay()),
      cache.clone(),
    );
    let students = StudentRepository::new(Arc::clone(&store), cache);
    let sync_state = SyncState::new(store);
    let synchronizer = Synchronizer::new(
      client.clone(),
      students.clone(),
      sync_state.clone(),
      config.sync.submission_window,
    );
    let notifier = InactivityNotifier::new(students.clone(), config.sync.inactivity_threshold_days);

    Self {
      client,
      students,
      sync_state,
      synchronizer,
      notifier,
    }
  }

  /// Force-sync every student, then raise reminders from the fresh records.
  pub async fn sync_all_and_remind<F>(&self, on_progress: F) -> Result<FullSync, RepositoryError>
  where
    F: FnMut(SyncProgress),
  {
    let reports = self.synchronizer.sync_all(true, on_progress).await?;
    let students: Vec<_> = reports.iter().map(|r| r.student.clone()).collect();
    let reminders = self.notifier.scan(&students, chrono::Utc::now());

    Ok(FullSync { reports, reminders })
  }
}

/// The tracker as the binary runs it: SQLite storage and HTTP transport.
pub type LiveTracker = Tracker<SqliteStore, HttpTransport>;

/// Open the configured database and build the HTTP client.
pub fn open(config: &Config) -> Result<LiveTracker> {
  let store = SqliteStore::open(config.storage.path.as_deref())
    .map_err(|e| eyre!("Failed to open storage: {}", e))?;
  debug!(path = %store.path().display(), "Opened storage");

  let transport = HttpTransport::new(&config.codeforces.base_url, config.codeforces.timeout())
    .map_err(|e| eyre!("Failed to set up Codeforces client: {}", e))?;

  Ok(Tracker::new(Arc::new(store), transport, config))
}

impl<S: KeyValueStore, T: Transport> Clone for Tracker<S, T> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      students: self.students.clone(),
      sync_state: self.sync_state.clone(),
      synchronizer: self.synchronizer.clone(),
      notifier: self.notifier.clone(),
    }
  }
}
