//! Inactivity reminders.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::store::KeyValueStore;
use crate::students::{RepositoryError, Student, StudentRepository};

/// A reminder raised for one inactive student.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
  /// The student after the reminder count was bumped
  pub student: Student,
  pub message: String,
}

/// Whether `student` counts as inactive at `now`.
///
/// Students with reminders disabled are never inactive. A student with no
/// known submission is always inactive; otherwise the last submission must
/// be strictly older than `threshold_days`.
pub fn is_inactive(student: &Student, now: DateTime<Utc>, threshold_days: i64) -> bool {
  if student.reminders_disabled {
    return false;
  }

  match student.last_submission_at {
    Some(at) => now - at > Duration::days(threshold_days),
    None => true,
  }
}

pub struct InactivityNotifier<S: KeyValueStore> {
  students: StudentRepository<S>,
  threshold_days: i64,
}

impl<S: KeyValueStore> InactivityNotifier<S> {
  pub fn new(students: StudentRepository<S>, threshold_days: i64) -> Self {
    Self {
      students,
      threshold_days,
    }
  }

  pub fn threshold_days(&self) -> i64 {
    self.threshold_days
  }

  /// Raise a reminder for every inactive student in `students`.
  ///
  /// Each student is re-read from the roster first, so a record that was
  /// muted, synced or deleted after `students` was taken is judged as it is
  /// now. Each inactive student's count goes up by exactly one per scan,
  /// even if it appears twice in the input. A count that fails to persist is
  /// logged and the reminder is still raised.
  pub fn scan(&self, students: &[Student], now: DateTime<Utc>) -> Vec<Reminder> {
    let mut seen = HashSet::new();
    let mut reminders = Vec::new();

    for student in students {
      if !seen.insert(student.id) {
        continue;
      }

      let mut reminded = None;
      let result = self.students.modify(student.id, |current| {
        if !is_inactive(current, now, self.threshold_days) {
          return false;
        }
        current.reminder_count += 1;
        reminded = Some(current.clone());
        true
      });

      let reminded = match (result, reminded) {
        (Ok(saved), Some(_)) => saved,
        (Ok(_), None) => continue,
        (Err(RepositoryError::NotFound(_)), _) => continue,
        (Err(e), Some(reminded)) => {
          warn!(handle = %student.handle, error = %e, "Failed to save reminder count");
          reminded
        }
        (Err(e), None) => {
          warn!(handle = %student.handle, error = %e, "Failed to read student for inactivity check");
          continue;
        }
      };

      let message = reminder_message(&reminded, self.threshold_days);
      info!(handle = %reminded.handle, count = reminded.reminder_count, "Inactivity reminder");
      reminders.push(Reminder {
        student: reminded,
        message,
      });
    }

    reminders
  }
}

impl<S: KeyValueStore> Clone for InactivityNotifier<S> {
  fn clone(&self) -> Self {
    Self {
      students: self.students.clone(),
      threshold_days: self.threshold_days,
    }
  }
}

fn reminder_message(student: &Student, threshold_days: i64) -> String {
  format!(
    "Reminder: {} ({}) has been inactive for >{} days. Reminders sent: {}.",
    student.name, student.email, threshold_days, student.reminder_count
  )
}
