use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
  pub id: Uuid,
  pub name: String,
  pub email: String,
  pub phone: String,
  /// Codeforces handle, the join key to remote data
  pub handle: String,
  pub current_rating: Option<i32>,
  pub max_rating: Option<i32>,
  pub last_synced_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub reminder_count: u32,
  #[serde(default)]
  pub reminders_disabled: bool,
  #[serde(default)]
  pub last_submission_at: Option<DateTime<Utc>>,
}

impl Student {
  /// Whether `handle` refers to this student's Codeforces account.
  pub fn has_handle(&self, handle: &str) -> bool {
    self.handle.eq_ignore_ascii_case(handle)
  }
}

/// Whether `handle` can be a Codeforces handle: 1 to 24 ASCII letters,
/// digits, `_`, `-` or `.`. Anything else would corrupt request paths.
pub fn is_valid_handle(handle: &str) -> bool {
  (1..=24).contains(&handle.len())
    && handle
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// User-supplied fields for a new student.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewStudent {
  pub name: String,
  pub email: String,
  pub phone: String,
  pub handle: String,
}

impl NewStudent {
  pub(super) fn into_student(self) -> Student {
    Student {
      id: Uuid::new_v4(),
      name: self.name,
      email: self.email,
      phone: self.phone,
      handle: self.handle,
      current_rating: None,
      max_rating: None,
      last_synced_at: None,
      reminder_count: 0,
      reminders_disabled: false,
      last_submission_at: None,
    }
  }
}

/// Partial edit of a student's contact details; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct StudentChanges {
  pub name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub handle: Option<String>,
}

impl StudentChanges {
  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.handle.is_none()
  }

  /// Apply the changes to a copy of `student`.
  pub fn apply(self, student: &Student) -> Student {
    let mut updated = student.clone();
    if let Some(name) = self.name {
      updated.name = name;
    }
    if let Some(email) = self.email {
      updated.email = email;
    }
    if let Some(phone) = self.phone {
      updated.phone = phone;
    }
    if let Some(handle) = self.handle {
      updated.handle = handle;
    }
    updated
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_student_defaults() {
    let student = NewStudent {
      name: "Ada".into(),
      email: "ada@example.com".into(),
      phone: "555".into(),
      handle: "ada".into(),
    }
    .into_student();

    assert_eq!(student.current_rating, None);
    assert_eq!(student.max_rating, None);
    assert_eq!(student.last_synced_at, None);
    assert_eq!(student.reminder_count, 0);
    assert!(!student.reminders_disabled);
    assert!(student.has_handle("ADA"));
  }

  #[test]
  fn test_apply_changes() {
    let student = NewStudent {
      name: "Ada".into(),
      handle: "ada".into(),
      ..Default::default()
    }
    .into_student();

    let changes = StudentChanges {
      handle: Some("ada_l".into()),
      ..Default::default()
    };
    assert!(!changes.is_empty());

    let updated = changes.apply(&student);
    assert_eq!(updated.id, student.id);
    assert_eq!(updated.name, "Ada");
    assert_eq!(updated.handle, "ada_l");
  }

  #[test]
  fn test_deserialize_without_optional_fields() {
    let json = r#"{
      "id": "7d3f3c6e-4a52-4b6f-9d8e-2f1c1c1a0b01",
      "name": "Ada",
      "email": "",
      "phone": "",
      "handle": "ada",
      "current_rating": null,
      "max_rating": null,
      "last_synced_at": null
    }"#;

    let student: Student = serde_json::from_str(json).unwrap();
    assert_eq!(student.reminder_count, 0);
    assert_eq!(student.last_submission_at, None);
  }
}
