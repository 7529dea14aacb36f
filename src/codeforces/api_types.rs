//! Serde-deserializable types matching Codeforces API responses.
//!
//! Field names follow the API's camelCase; only the fields the tracker reads
//! are declared, everything else in a response is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Response envelope
// ============================================================================

/// Every Codeforces API response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
  pub status: String,
  pub comment: Option<String>,
  pub result: Option<Value>,
}

// ============================================================================
// user.info
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
  pub handle: String,
  pub rating: Option<i32>,
  pub max_rating: Option<i32>,
  pub rank: Option<String>,
  pub max_rank: Option<String>,
  pub avatar: Option<String>,
}

// ============================================================================
// user.rating
// ============================================================================

/// One rated contest in a user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
  pub contest_id: u64,
  pub contest_name: String,
  #[serde(default)]
  pub handle: String,
  pub rank: u32,
  pub rating_update_time_seconds: i64,
  pub old_rating: i32,
  pub new_rating: i32,
}

impl RatingChange {
  pub fn updated_at(&self) -> DateTime<Utc> {
    timestamp(self.rating_update_time_seconds)
  }

  pub fn delta(&self) -> i32 {
    self.new_rating - self.old_rating
  }
}

// ============================================================================
// user.status / contest.standings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
  pub contest_id: Option<u64>,
  pub index: String,
  #[serde(default)]
  pub name: String,
  #[serde(rename = "type")]
  pub problem_type: Option<String>,
  pub points: Option<f64>,
  pub rating: Option<i32>,
  #[serde(default)]
  pub tags: Vec<String>,
}

/// Judge outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
  Ok,
  Failed,
  Partial,
  CompilationError,
  RuntimeError,
  WrongAnswer,
  PresentationError,
  TimeLimitExceeded,
  MemoryLimitExceeded,
  IdlenessLimitExceeded,
  SecurityViolated,
  Crashed,
  InputPreparationCrashed,
  Challenged,
  Skipped,
  Testing,
  Rejected,
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
  pub id: u64,
  pub contest_id: Option<u64>,
  pub creation_time_seconds: i64,
  pub problem: Problem,
  #[serde(default)]
  pub programming_language: String,
  pub verdict: Option<Verdict>,
  #[serde(default)]
  pub passed_test_count: u32,
  #[serde(default)]
  pub time_consumed_millis: u64,
  #[serde(default)]
  pub memory_consumed_bytes: u64,
}

impl Submission {
  pub fn created_at(&self) -> DateTime<Utc> {
    timestamp(self.creation_time_seconds)
  }

  pub fn is_accepted(&self) -> bool {
    self.verdict == Some(Verdict::Ok)
  }
}

/// Subset of the `contest.standings` result needed to count a contest's problems.
#[derive(Debug, Deserialize)]
pub struct StandingsResult {
  #[serde(default)]
  pub problems: Vec<Problem>,
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
  DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}
