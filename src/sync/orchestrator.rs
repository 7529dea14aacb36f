//! Refreshing students' derived fields from Codeforces.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{info, warn};

use super::schedule::SyncState;
use crate::codeforces::{CachedCodeforcesClient, Submission, Transport};
use crate::store::KeyValueStore;
use crate::students::{RepositoryError, Student, StudentRepository};

/// Stage of a student sync that can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
  Profile,
  Submissions,
  Persist,
}

impl fmt::Display for SyncStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Profile => "profile",
      Self::Submissions => "submissions",
      Self::Persist => "save",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
  pub step: SyncStep,
  pub message: String,
}

impl fmt::Display for SyncFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.step, self.message)
  }
}

/// How much of a sync made it into storage.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
  /// Every step succeeded and the record was saved
  Complete,
  /// Some steps failed; what did succeed was saved
  Partial(Vec<SyncFailure>),
  /// Nothing was saved; the stored record is unchanged
  Failed(Vec<SyncFailure>),
}

impl SyncOutcome {
  pub fn is_complete(&self) -> bool {
    matches!(self, Self::Complete)
  }

  pub fn failures(&self) -> &[SyncFailure] {
    match self {
      Self::Complete => &[],
      Self::Partial(failures) | Self::Failed(failures) => failures,
    }
  }
}

/// Result of syncing one student.
#[derive(Debug, Clone)]
pub struct SyncReport {
  /// The student as stored after the sync
  pub student: Student,
  pub outcome: SyncOutcome,
}

/// Progress of a bulk sync, reported before each student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
  pub index: usize,
  pub total: usize,
  pub name: String,
}

/// Pulls profile and submission data for students and stores the result.
pub struct Synchronizer<S: KeyValueStore, T: Transport> {
  client: CachedCodeforcesClient<S, T>,
  students: StudentRepository<S>,
  state: SyncState<S>,
  /// How many recent submissions to inspect for the last submission date
  submission_window: usize,
}

impl<S: KeyValueStore, T: Transport> Synchronizer<S, T> {
  pub fn new(
    client: CachedCodeforcesClient<S, T>,
    students: StudentRepository<S>,
    state: SyncState<S>,
    submission_window: usize,
  ) -> Self {
    Self {
      client,
      students,
      state,
      submission_window,
    }
  }

  /// Sync one student. Never fails; see [`SyncOutcome`] for what was saved.
  ///
  /// Profile and submissions are fetched independently, so a failure in one
  /// does not discard the other. Ratings are only overwritten when the API
  /// returns a value. Only the synced fields are written, onto the record as
  /// stored after the fetches, so edits made meanwhile are kept.
  pub async fn sync_student(&self, student: &Student, force: bool) -> SyncReport {
    let mut failures = Vec::new();
    let mut profile = None;
    let mut last_submission = None;

    match self
      .client
      .user_info(std::slice::from_ref(&student.handle), force)
      .await
    {
      Ok(infos) => profile = Some(infos.into_iter().next()),
      Err(e) => {
        warn!(handle = %student.handle, error = %e, "Failed to fetch profile");
        failures.push(SyncFailure {
          step: SyncStep::Profile,
          message: e.to_string(),
        });
      }
    }

    match self
      .client
      .submissions(&student.handle, self.submission_window, force)
      .await
    {
      Ok(submissions) => last_submission = Some(last_submission_time(&submissions)),
      Err(e) => {
        warn!(handle = %student.handle, error = %e, "Failed to fetch submissions");
        failures.push(SyncFailure {
          step: SyncStep::Submissions,
          message: e.to_string(),
        });
      }
    }

    if profile.is_none() && last_submission.is_none() {
      return SyncReport {
        student: student.clone(),
        outcome: SyncOutcome::Failed(failures),
      };
    }

    let synced_at = Utc::now();
    let mut handle_changed = false;
    let saved = self.students.modify(student.id, |current| {
      // Data fetched for a handle the student no longer has is discarded
      if !current.has_handle(&student.handle) {
        handle_changed = true;
        return false;
      }
      if let Some(Some(info)) = &profile {
        current.current_rating = info.rating.or(current.current_rating);
        current.max_rating = info.max_rating.or(current.max_rating);
      }
      if let Some(Some(at)) = last_submission {
        current.last_submission_at = Some(at);
      }
      current.last_synced_at = Some(synced_at);
      true
    });

    let error = match saved {
      Ok(saved) if !handle_changed => {
        info!(handle = %saved.handle, failures = failures.len(), "Synced student");
        let outcome = if failures.is_empty() {
          SyncOutcome::Complete
        } else {
          SyncOutcome::Partial(failures)
        };
        return SyncReport {
          student: saved,
          outcome,
        };
      }
      Ok(current) => format!("handle changed to {} during sync", current.handle),
      Err(e) => e.to_string(),
    };

    warn!(handle = %student.handle, error = %error, "Failed to save synced student");
    failures.push(SyncFailure {
      step: SyncStep::Persist,
      message: error,
    });
    SyncReport {
      student: student.clone(),
      outcome: SyncOutcome::Failed(failures),
    }
  }

  /// Sync every stored student, one after another.
  ///
  /// `on_progress` is called before each student. The global sync time is
  /// recorded after the pass even when individual students failed.
  pub async fn sync_all<F>(&self, force: bool, mut on_progress: F) -> Result<Vec<SyncReport>, RepositoryError>
  where
    F: FnMut(SyncProgress),
  {
    let students = self.students.list()?;
    let total = students.len();
    let mut reports = Vec::with_capacity(total);

    for (index, student) in students.iter().enumerate() {
      on_progress(SyncProgress {
        index,
        total,
        name: student.name.clone(),
      });
      reports.push(self.sync_student(student, force).await);
    }

    if let Err(e) = self.state.record_global_sync(Utc::now()) {
      warn!(error = %e, "Failed to record global sync time");
    }

    let failed = reports.iter().filter(|r| !r.outcome.is_complete()).count();
    info!(total, failed, "Finished syncing all students");

    Ok(reports)
  }
}

impl<S: KeyValueStore, T: Transport> Clone for Synchronizer<S, T> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      students: self.students.clone(),
      state: self.state.clone(),
      submission_window: self.submission_window,
    }
  }
}

/// Time of the newest accepted submission, or of the newest submission of
/// any verdict when none was accepted.
pub fn last_submission_time(submissions: &[Submission]) -> Option<DateTime<Utc>> {
  submissions
    .iter()
    .filter(|s| s.is_accepted())
    .max_by_key(|s| s.creation_time_seconds)
    .or_else(|| submissions.iter().max_by_key(|s| s.creation_time_seconds))
    .map(Submission::created_at)
}
