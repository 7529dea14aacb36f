//! Keeping the roster in step with Codeforces.
//!
//! - [`Synchronizer`] refreshes ratings and last-submission times
//! - [`InactivityNotifier`] raises reminders for students who stopped submitting
//! - [`should_auto_sync`] decides when a full sync is due

mod notifier;
mod orchestrator;
mod schedule;

pub use notifier::{is_inactive, InactivityNotifier, Reminder};
pub use orchestrator::{
  last_submission_time, SyncFailure, SyncOutcome, SyncProgress, SyncReport, SyncStep, Synchronizer,
};
pub use schedule::{should_auto_sync, SyncSettings, SyncState};
