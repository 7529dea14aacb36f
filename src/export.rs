//! Roster export as CSV.

use chrono::{Local, TimeZone};
use std::path::Path;

use crate::students::Student;

pub const DEFAULT_EXPORT_FILE: &str = "students_progress.csv";

const HEADERS: [&str; 7] = [
  "Name",
  "Email",
  "Phone Number",
  "Codeforces Handle",
  "Current Rating",
  "Max Rating",
  "Last Synced",
];
const MISSING: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
  #[error("Failed to write CSV: {0}")]
  Csv(#[from] csv::Error),
  #[error("Failed to write export: {0}")]
  Io(#[from] std::io::Error),
}

/// Render the roster as CSV with sync times in local time.
pub fn roster_csv(students: &[Student]) -> Result<String, ExportError> {
  roster_csv_in(students, &Local)
}

/// Render the roster as CSV with sync times in `tz`.
///
/// An empty roster renders as an empty string, without a header row.
pub fn roster_csv_in<Tz: TimeZone>(students: &[Student], tz: &Tz) -> Result<String, ExportError>
where
  Tz::Offset: std::fmt::Display,
{
  if students.is_empty() {
    return Ok(String::new());
  }

  let mut writer = csv::WriterBuilder::new()
    .terminator(csv::Terminator::Any(b'\n'))
    .from_writer(Vec::new());
  writer.write_record(HEADERS)?;

  for student in students {
    let last_synced = student
      .last_synced_at
      .map(|at| at.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string());
    writer.write_record([
      student.name.clone(),
      student.email.clone(),
      student.phone.clone(),
      student.handle.clone(),
      or_missing(student.current_rating),
      or_missing(student.max_rating),
      last_synced.unwrap_or_else(|| MISSING.to_string()),
    ])?;
  }

  let bytes = writer.into_inner().map_err(|e| e.into_error())?;
  let text = String::from_utf8(bytes)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
  Ok(text.trim_end_matches('\n').to_string())
}

/// Write the roster CSV to `path`.
pub fn write_roster_csv(students: &[Student], path: &Path) -> Result<(), ExportError> {
  let text = roster_csv(students)?;
  std::fs::write(path, text)?;
  Ok(())
}

fn or_missing(value: Option<i32>) -> String {
  value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}
