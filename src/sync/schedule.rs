//! Automatic sync schedule.
//!
//! There is no background scheduler: whenever the tracker starts (or `auto`
//! runs from cron), [`should_auto_sync`] decides from the last global sync
//! time and the configured schedule whether a full sync is due.

use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::store::{KeyValueStore, StoreError};

const LAST_GLOBAL_SYNC_KEY: &str = "last_global_sync";
const SYNC_SETTINGS_KEY: &str = "sync_settings";

/// When automatic syncs should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
  /// Hour of day (0-23, local time) at which a sync becomes due
  pub hour: u32,
  /// Days between syncs
  pub frequency_days: u32,
}

impl Default for SyncSettings {
  fn default() -> Self {
    Self {
      hour: 2,
      frequency_days: 1,
    }
  }
}

impl SyncSettings {
  pub fn is_valid(&self) -> bool {
    self.hour <= 23 && self.frequency_days >= 1
  }
}

/// Persisted sync bookkeeping: settings and the last global sync time.
pub struct SyncState<S: KeyValueStore> {
  storage: Arc<S>,
}

impl<S: KeyValueStore> SyncState<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// Stored settings, or the defaults when missing or invalid.
  pub fn settings(&self) -> SyncSettings {
    let text = match self.storage.get(SYNC_SETTINGS_KEY) {
      Ok(Some(text)) => text,
      Ok(None) => return SyncSettings::default(),
      Err(e) => {
        warn!(error = %e, "Failed to read sync settings, using defaults");
        return SyncSettings::default();
      }
    };

    match serde_json::from_str::<SyncSettings>(&text) {
      Ok(settings) if settings.is_valid() => settings,
      Ok(settings) => {
        warn!(?settings, "Stored sync settings out of range, using defaults");
        SyncSettings::default()
      }
      Err(e) => {
        warn!(error = %e, "Failed to parse sync settings, using defaults");
        SyncSettings::default()
      }
    }
  }

  pub fn save_settings(&self, settings: &SyncSettings) -> Result<(), StoreError> {
    let text =
      serde_json::to_string(settings).map_err(|e| StoreError::Backend(e.to_string()))?;
    self.storage.set(SYNC_SETTINGS_KEY, &text)
  }

  pub fn last_global_sync(&self) -> Option<DateTime<Utc>> {
    let text = match self.storage.get(LAST_GLOBAL_SYNC_KEY) {
      Ok(text) => text?,
      Err(e) => {
        warn!(error = %e, "Failed to read last global sync time");
        return None;
      }
    };

    match DateTime::parse_from_rfc3339(&text) {
      Ok(at) => Some(at.with_timezone(&Utc)),
      Err(e) => {
        warn!(error = %e, value = %text, "Ignoring unparseable last global sync time");
        None
      }
    }
  }

  pub fn record_global_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
    self.storage.set(LAST_GLOBAL_SYNC_KEY, &at.to_rfc3339())
  }
}

impl<S: KeyValueStore> Clone for SyncState<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

/// Decide whether a full sync is due.
///
/// - Synced within the last hour with an empty roster: not due
/// - Synced before: due once `now` passes the sync day plus
///   `frequency_days`, at `hour`:00 in `now`'s time zone
/// - Never synced: due when there is anyone to sync
pub fn should_auto_sync<Tz: TimeZone>(
  last_sync: Option<DateTime<Utc>>,
  settings: &SyncSettings,
  now: &DateTime<Tz>,
  roster_len: usize,
) -> bool {
  let last_sync = match last_sync {
    Some(at) => at,
    None => return roster_len > 0,
  };

  if roster_len == 0 && now.with_timezone(&Utc) - last_sync < Duration::hours(1) {
    return false;
  }

  let tz = now.timezone();
  let next_day = match last_sync
    .with_timezone(&tz)
    .date_naive()
    .checked_add_days(Days::new(u64::from(settings.frequency_days)))
  {
    Some(day) => day,
    None => return false,
  };
  let next_local = match next_day.and_hms_opt(settings.hour.min(23), 0, 0) {
    Some(at) => at,
    None => return false,
  };

  // Skipped local times (DST gaps) fall forward by an hour
  let next = tz
    .from_local_datetime(&next_local)
    .earliest()
    .or_else(|| tz.from_local_datetime(&(next_local + Duration::hours(1))).earliest());

  match next {
    Some(next) => *now > next,
    None => true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use chrono::FixedOffset;

  fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
  }

  #[test]
  fn test_never_synced() {
    let settings = SyncSettings::default();
    let now = utc("2024-05-10T12:00:00Z");

    assert!(should_auto_sync(None, &settings, &now, 3));
    assert!(!should_auto_sync(None, &settings, &now, 0));
  }

  #[test]
  fn test_due_after_next_scheduled_hour() {
    let settings = SyncSettings {
      hour: 2,
      frequency_days: 1,
    };
    let last = utc("2024-05-10T15:00:00Z");

    // Next sync: 2024-05-11 02:00
    assert!(!should_auto_sync(Some(last), &settings, &utc("2024-05-11T01:59:00Z"), 2));
    assert!(!should_auto_sync(Some(last), &settings, &utc("2024-05-11T02:00:00Z"), 2));
    assert!(should_auto_sync(Some(last), &settings, &utc("2024-05-11T02:01:00Z"), 2));
  }

  #[test]
  fn test_frequency_in_days() {
    let settings = SyncSettings {
      hour: 6,
      frequency_days: 3,
    };
    let last = utc("2024-05-10T08:00:00Z");

    assert!(!should_auto_sync(Some(last), &settings, &utc("2024-05-13T05:00:00Z"), 1));
    assert!(should_auto_sync(Some(last), &settings, &utc("2024-05-13T07:00:00Z"), 1));
  }

  #[test]
  fn test_recent_sync_with_empty_roster() {
    let settings = SyncSettings {
      hour: 0,
      frequency_days: 1,
    };
    let last = utc("2024-05-10T23:30:00Z");

    // Scheduled time (05-11 00:00) has passed, but the roster is empty and
    // the last sync was under an hour ago
    assert!(!should_auto_sync(Some(last), &settings, &utc("2024-05-11T00:10:00Z"), 0));
    assert!(should_auto_sync(Some(last), &settings, &utc("2024-05-11T00:10:00Z"), 1));
  }

  #[test]
  fn test_schedule_uses_now_time_zone() {
    let settings = SyncSettings {
      hour: 2,
      frequency_days: 1,
    };
    let tz = FixedOffset::east_opt(5 * 3600).unwrap();
    // 2024-05-10 22:00 UTC is 2024-05-11 03:00 at +05:00, so the next sync
    // is 2024-05-12 02:00 local (2024-05-11 21:00 UTC)
    let last = utc("2024-05-10T22:00:00Z");

    let before = utc("2024-05-11T20:59:00Z").with_timezone(&tz);
    let after = utc("2024-05-11T21:01:00Z").with_timezone(&tz);
    assert!(!should_auto_sync(Some(last), &settings, &before, 1));
    assert!(should_auto_sync(Some(last), &settings, &after, 1));
  }

  #[test]
  fn test_settings_roundtrip_and_defaults() {
    let state = SyncState::new(Arc::new(MemoryStore::new()));
    assert_eq!(state.settings(), SyncSettings::default());

    let settings = SyncSettings {
      hour: 23,
      frequency_days: 7,
    };
    state.save_settings(&settings).unwrap();
    assert_eq!(state.settings(), settings);
  }

  #[test]
  fn test_invalid_settings_fall_back_to_defaults() {
    let store = Arc::new(MemoryStore::new());
    let state = SyncState::new(store.clone());

    store.set(SYNC_SETTINGS_KEY, r#"{"hour": 30, "frequency_days": 1}"#).unwrap();
    assert_eq!(state.settings(), SyncSettings::default());

    store.set(SYNC_SETTINGS_KEY, r#"{"hour": "two"}"#).unwrap();
    assert_eq!(state.settings(), SyncSettings::default());
  }

  #[test]
  fn test_last_global_sync() {
    let store = Arc::new(MemoryStore::new());
    let state = SyncState::new(store.clone());
    assert_eq!(state.last_global_sync(), None);

    let at = utc("2024-05-10T15:00:00Z");
    state.record_global_sync(at).unwrap();
    assert_eq!(state.last_global_sync(), Some(at));

    store.set(LAST_GLOBAL_SYNC_KEY, "yesterday").unwrap();
    assert_eq!(state.last_global_sync(), None);
  }
}
