//! Persisted student roster.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{is_valid_handle, NewStudent, Student, StudentChanges};
use crate::cache::CacheLayer;
use crate::store::{KeyValueStore, StoreError};

const STUDENTS_KEY: &str = "students";

/// Failures of roster operations.
///
/// `NotFound` and `Save` are deliberately separate so callers can tell a
/// missing student from a persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
  #[error("No student matches '{0}'")]
  NotFound(String),
  #[error("'{0}' matches more than one student")]
  Ambiguous(String),
  #[error("Failed to save students: {0}")]
  Save(#[source] StoreError),
  #[error("Failed to read students: {0}")]
  Load(#[source] StoreError),
  #[error("'{0}' is not a valid Codeforces handle")]
  InvalidHandle(String),
}

/// CRUD over the roster stored as a JSON array under one key.
///
/// Every write is a read-modify-write of the whole roster, so writers are
/// serialized through a lock shared by all clones.
pub struct StudentRepository<S: KeyValueStore> {
  storage: Arc<S>,
  cache: CacheLayer<S>,
  writer: Arc<Mutex<()>>,
}

impl<S: KeyValueStore> StudentRepository<S> {
  pub fn new(storage: Arc<S>, cache: CacheLayer<S>) -> Self {
    Self {
      storage,
      cache,
      writer: Arc::new(Mutex::new(())),
    }
  }

  fn lock(&self) -> MutexGuard<'_, ()> {
    // The guarded data is (), so a poisoned lock is still usable
    self.writer.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// All students in insertion order.
  ///
  /// A stored roster that is not a well-formed list of students is removed
  /// and an empty roster returned.
  pub fn list(&self) -> Result<Vec<Student>, RepositoryError> {
    let text = match self.storage.get(STUDENTS_KEY).map_err(RepositoryError::Load)? {
      Some(text) => text,
      None => return Ok(Vec::new()),
    };

    match parse_roster(&text) {
      Ok(students) => Ok(students),
      Err(reason) => {
        warn!(%reason, "Stored student data is corrupt, clearing it");
        if let Err(e) = self.storage.remove(STUDENTS_KEY) {
          warn!(error = %e, "Failed to clear corrupt student data");
        }
        Ok(Vec::new())
      }
    }
  }

  fn save(&self, students: &[Student]) -> Result<(), RepositoryError> {
    let text = serde_json::to_string(students)
      .map_err(|e| RepositoryError::Save(StoreError::Backend(e.to_string())))?;
    self
      .storage
      .set(STUDENTS_KEY, &text)
      .map_err(RepositoryError::Save)
  }

  pub fn get(&self, id: Uuid) -> Result<Option<Student>, RepositoryError> {
    Ok(self.list()?.into_iter().find(|s| s.id == id))
  }

  /// Find a student by full id, handle (case-insensitive), or unique id prefix.
  pub fn resolve(&self, selector: &str) -> Result<Student, RepositoryError> {
    let selector = selector.trim();
    let students = self.list()?;

    if let Ok(id) = Uuid::parse_str(selector) {
      if let Some(student) = students.iter().find(|s| s.id == id) {
        return Ok(student.clone());
      }
    }

    let by_handle: Vec<&Student> = students.iter().filter(|s| s.has_handle(selector)).collect();
    match by_handle.as_slice() {
      [student] => return Ok((*student).clone()),
      [] => {}
      _ => return Err(RepositoryError::Ambiguous(selector.to_string())),
    }

    let prefix = selector.to_ascii_lowercase();
    if prefix.is_empty() {
      return Err(RepositoryError::NotFound(selector.to_string()));
    }
    let by_prefix: Vec<&Student> = students
      .iter()
      .filter(|s| s.id.to_string().starts_with(&prefix))
      .collect();
    match by_prefix.as_slice() {
      [student] => Ok((*student).clone()),
      [] => Err(RepositoryError::NotFound(selector.to_string())),
      _ => Err(RepositoryError::Ambiguous(selector.to_string())),
    }
  }

  /// Add a new student with empty rating, sync and reminder fields.
  pub fn add(&self, new_student: NewStudent) -> Result<Student, RepositoryError> {
    check_handle(&new_student.handle)?;
    let _guard = self.lock();
    let mut students = self.list()?;
    let student = new_student.into_student();

    // A handle re-added after deletion must not see stale responses
    self.cache.invalidate_handle(&student.handle);

    students.push(student.clone());
    self.save(&students)?;

    info!(id = %student.id, handle = %student.handle, "Added student");
    Ok(student)
  }

  /// Replace the stored record with the same id.
  pub fn update(&self, student: Student) -> Result<Student, RepositoryError> {
    let id = student.id;
    self.modify(id, move |current| {
      *current = student;
      true
    })
  }

  /// Re-read a student, let `change` edit it, and save when it reports a
  /// change. Other writers cannot interleave between the read and the save.
  ///
  /// Returns the stored record, changed or not.
  pub fn modify<F>(&self, id: Uuid, change: F) -> Result<Student, RepositoryError>
  where
    F: FnOnce(&mut Student) -> bool,
  {
    let _guard = self.lock();
    let mut students = self.list()?;
    let index = students
      .iter()
      .position(|s| s.id == id)
      .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

    let mut student = students[index].clone();
    if !change(&mut student) {
      return Ok(students.swap_remove(index));
    }
    student.id = id;

    if !students[index].has_handle(&student.handle) {
      check_handle(&student.handle)?;
      self.cache.invalidate_handle(&students[index].handle);
    }

    students[index] = student.clone();
    self.save(&students)?;

    Ok(student)
  }

  /// Apply contact-detail changes to a student.
  pub fn edit(&self, id: Uuid, changes: StudentChanges) -> Result<Student, RepositoryError> {
    self.modify(id, move |current| {
      *current = changes.apply(current);
      true
    })
  }

  /// Turn inactivity reminders off (`true`) or back on for a student.
  pub fn set_reminders_disabled(&self, id: Uuid, disabled: bool) -> Result<Student, RepositoryError> {
    self.modify(id, |current| {
      current.reminders_disabled = disabled;
      true
    })
  }

  /// Remove a student and its cached API responses.
  pub fn delete(&self, id: Uuid) -> Result<Student, RepositoryError> {
    let _guard = self.lock();
    let mut students = self.list()?;
    let index = students
      .iter()
      .position(|s| s.id == id)
      .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

    let removed = students.remove(index);
    self.cache.invalidate_handle(&removed.handle);
    self.save(&students)?;

    info!(id = %removed.id, handle = %removed.handle, "Deleted student");
    Ok(removed)
  }
}

impl<S: KeyValueStore> Clone for StudentRepository<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      cache: self.cache.clone(),
      writer: Arc::clone(&self.writer),
    }
  }
}

fn check_handle(handle: &str) -> Result<(), RepositoryError> {
  if is_valid_handle(handle) {
    Ok(())
  } else {
    Err(RepositoryError::InvalidHandle(handle.to_string()))
  }
}

fn parse_roster(text: &str) -> Result<Vec<Student>, String> {
  let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
  if !value.is_array() {
    return Err("stored roster is not a list".to_string());
  }
  serde_json::from_value(value).map_err(|e| e.to_string())
}
