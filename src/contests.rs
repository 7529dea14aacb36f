//! Contest history of a student: window filtering, per-contest solve counts,
//! and the rating series for charts.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::codeforces::{ApiError, CachedCodeforcesClient, RatingChange, Submission, Transport};
use crate::store::KeyValueStore;

/// Contests whose details are loaded per "load more".
pub const DETAILS_BATCH: usize = 10;
/// Recent submissions scanned for solve counts.
pub const DETAILS_SUBMISSION_COUNT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContestWindow {
  Days30,
  Days90,
  #[default]
  Days365,
  All,
}

impl ContestWindow {
  pub const ALL: [ContestWindow; 4] = [Self::Days30, Self::Days90, Self::Days365, Self::All];

  pub fn days(self) -> Option<i64> {
    match self {
      Self::Days30 => Some(30),
      Self::Days90 => Some(90),
      Self::Days365 => Some(365),
      Self::All => None,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Days30 => "Last 30 days",
      Self::Days90 => "Last 90 days",
      Self::Days365 => "Last 365 days",
      Self::All => "All time",
    }
  }

  /// The next window in cycling order.
  pub fn next(self) -> Self {
    match self {
      Self::Days30 => Self::Days90,
      Self::Days90 => Self::Days365,
      Self::Days365 => Self::All,
      Self::All => Self::Days30,
    }
  }

  fn contains(self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match self.days() {
      Some(days) => at > now - Duration::days(days),
      None => true,
    }
  }
}

/// One rated contest with its solve counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ContestDetails {
  pub contest_id: u64,
  pub contest_name: String,
  pub rank: u32,
  pub old_rating: i32,
  pub new_rating: i32,
  pub updated_at: DateTime<Utc>,
  pub solved: usize,
  pub unsolved: usize,
  /// Problems in the contest's standings
  pub total: usize,
  /// Set when the contest's problem list could not be fetched; counts are zero
  pub details_error: Option<String>,
}

impl ContestDetails {
  pub fn delta(&self) -> i32 {
    self.new_rating - self.old_rating
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingPoint {
  pub at: DateTime<Utc>,
  pub rating: i32,
  pub contest_name: String,
}

/// Rating history plus whatever contest details have been loaded so far.
///
/// Details are keyed by contest and kept when the window changes, so widening
/// the window only loads the contests not seen yet.
#[derive(Debug, Clone, Default)]
pub struct ContestHistory {
  /// Ascending by update time
  changes: Vec<RatingChange>,
  details: HashMap<u64, ContestDetails>,
  window: ContestWindow,
}

impl ContestHistory {
  pub fn new(mut changes: Vec<RatingChange>) -> Self {
    changes.sort_by_key(|c| c.rating_update_time_seconds);
    Self {
      changes,
      details: HashMap::new(),
      window: ContestWindow::default(),
    }
  }

  pub fn window(&self) -> ContestWindow {
    self.window
  }

  pub fn set_window(&mut self, window: ContestWindow) {
    self.window = window;
  }

  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }

  /// In-window contests, oldest first.
  pub fn in_window(&self, now: DateTime<Utc>) -> Vec<&RatingChange> {
    self
      .changes
      .iter()
      .filter(|c| self.window.contains(c.updated_at(), now))
      .collect()
  }

  /// Up to `size` in-window contests without details, newest first.
  pub fn pending_batch(&self, now: DateTime<Utc>, size: usize) -> Vec<RatingChange> {
    self
      .in_window(now)
      .into_iter()
      .rev()
      .filter(|c| !self.details.contains_key(&c.contest_id))
      .take(size)
      .cloned()
      .collect()
  }

  pub fn merge(&mut self, details: Vec<ContestDetails>) {
    for detail in details {
      self.details.insert(detail.contest_id, detail);
    }
  }

  /// Loaded details of in-window contests, newest first.
  pub fn detailed(&self, now: DateTime<Utc>) -> Vec<&ContestDetails> {
    let mut detailed: Vec<&ContestDetails> = self
      .in_window(now)
      .into_iter()
      .filter_map(|c| self.details.get(&c.contest_id))
      .collect();
    detailed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    detailed
  }

  /// Whether any in-window contest still lacks details.
  pub fn has_more(&self, now: DateTime<Utc>) -> bool {
    self
      .in_window(now)
      .iter()
      .any(|c| !self.details.contains_key(&c.contest_id))
  }

  pub fn rating_series(&self, now: DateTime<Utc>) -> Vec<RatingPoint> {
    self
      .in_window(now)
      .into_iter()
      .map(|c| RatingPoint {
        at: c.updated_at(),
        rating: c.new_rating,
        contest_name: c.contest_name.clone(),
      })
      .collect()
  }
}

/// Load solve counts for a batch of contests.
///
/// A failed submission fetch fails the whole batch. A failed problem list
/// only marks that contest with `details_error`.
pub async fn fetch_contest_details<S: KeyValueStore, T: Transport>(
  client: &CachedCodeforcesClient<S, T>,
  handle: &str,
  batch: &[RatingChange],
  force: bool,
) -> Result<Vec<ContestDetails>, ApiError> {
  if batch.is_empty() {
    return Ok(Vec::new());
  }

  let submissions = client
    .submissions(handle, DETAILS_SUBMISSION_COUNT, force)
    .await?;

  let mut details = Vec::with_capacity(batch.len());
  for change in batch {
    let solved = solved_in_contest(&submissions, change.contest_id);
    let mut detail = ContestDetails {
      contest_id: change.contest_id,
      contest_name: change.contest_name.clone(),
      rank: change.rank,
      old_rating: change.old_rating,
      new_rating: change.new_rating,
      updated_at: change.updated_at(),
      solved: 0,
      unsolved: 0,
      total: 0,
      details_error: None,
    };

    match client.contest_problems(change.contest_id, force).await {
      Ok(problems) => {
        detail.solved = solved;
        detail.total = problems.len();
        detail.unsolved = detail.total.saturating_sub(solved);
      }
      Err(e) => {
        warn!(contest_id = change.contest_id, error = %e, "Failed to fetch contest problems");
        detail.details_error = Some(e.to_string());
      }
    }
    details.push(detail);
  }

  debug!(handle, loaded = details.len(), "Loaded contest details");
  Ok(details)
}

/// Distinct problems with an accepted submission in `contest_id`.
fn solved_in_contest(submissions: &[Submission], contest_id: u64) -> usize {
  submissions
    .iter()
    .filter(|s| s.is_accepted())
    .filter(|s| s.contest_id.or(s.problem.contest_id) == Some(contest_id))
    .map(|s| s.problem.index.as_str())
    .collect::<HashSet<_>>()
    .len()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{self, rating_change_json, standings_json, submission_json};
  use serde_json::json;

  const DAY: i64 = 86_400;

  fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
  }

  fn change(contest_id: u64, days_ago: i64, old: i32, new: i32) -> RatingChange {
    serde_json::from_value(rating_change_json(
      contest_id,
      now().timestamp() - days_ago * DAY,
      old,
      new,
    ))
    .unwrap()
  }

  fn detail(change: &RatingChange) -> ContestDetails {
    ContestDetails {
      contest_id: change.contest_id,
      contest_name: change.contest_name.clone(),
      rank: change.rank,
      old_rating: change.old_rating,
      new_rating: change.new_rating,
      updated_at: change.updated_at(),
      solved: 0,
      unsolved: 0,
      total: 0,
      details_error: None,
    }
  }

  #[test]
  fn test_window_cycle() {
    let mut window = ContestWindow::default();
    assert_eq!(window, ContestWindow::Days365);
    for _ in 0..ContestWindow::ALL.len() {
      window = window.next();
    }
    assert_eq!(window, ContestWindow::Days365);
    assert_eq!(ContestWindow::All.days(), None);
  }

  #[test]
  fn test_window_filter_and_series() {
    let mut history = ContestHistory::new(vec![
      change(3, 10, 1500, 1550),
      change(1, 400, 0, 1400),
      change(2, 60, 1400, 1500),
    ]);

    let ids: Vec<u64> = history.in_window(now()).iter().map(|c| c.contest_id).collect();
    assert_eq!(ids, vec![2, 3]);

    history.set_window(ContestWindow::Days30);
    let series = history.rating_series(now());
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].rating, 1550);

    history.set_window(ContestWindow::All);
    let ratings: Vec<i32> = history.rating_series(now()).iter().map(|p| p.rating).collect();
    assert_eq!(ratings, vec![1400, 1500, 1550]);
  }

  #[test]
  fn test_batches_newest_first_and_skip_loaded() {
    let changes: Vec<RatingChange> = (1..=12).map(|i| change(i, 100 - i as i64, 1000, 1010)).collect();
    let mut history = ContestHistory::new(changes);

    let first = history.pending_batch(now(), DETAILS_BATCH);
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].contest_id, 12);
    assert_eq!(first[9].contest_id, 3);

    history.merge(first.iter().map(detail).collect());
    assert!(history.has_more(now()));

    let second = history.pending_batch(now(), DETAILS_BATCH);
    let ids: Vec<u64> = second.iter().map(|c| c.contest_id).collect();
    assert_eq!(ids, vec![2, 1]);

    history.merge(second.iter().map(detail).collect());
    assert!(!history.has_more(now()));
    assert_eq!(history.detailed(now())[0].contest_id, 12);
  }

  #[test]
  fn test_details_survive_window_change() {
    let recent = change(2, 5, 1000, 1100);
    let old = change(1, 200, 900, 1000);
    let mut history = ContestHistory::new(vec![old.clone(), recent.clone()]);

    history.set_window(ContestWindow::Days30);
    history.merge(vec![detail(&recent)]);
    assert!(!history.has_more(now()));

    history.set_window(ContestWindow::Days365);
    assert!(history.has_more(now()));
    let pending = history.pending_batch(now(), DETAILS_BATCH);
    assert_eq!(pending, vec![old]);
    assert_eq!(history.detailed(now()).len(), 1);
  }

  #[tokio::test]
  async fn test_fetch_details_counts_distinct_solves() {
    let fx = testing::fixture();
    let c10 = change(10, 3, 1500, 1540);
    let c20 = change(20, 2, 1540, 1500);
    fx.transport.respond_ok(
      "user.status?handle=ada&from=1&count=2000",
      json!([
        submission_json(1, Some(10), "A", 100, "OK"),
        submission_json(2, Some(10), "A", 110, "OK"),
        submission_json(3, Some(10), "B", 120, "OK"),
        submission_json(4, Some(10), "C", 130, "WRONG_ANSWER"),
        submission_json(5, Some(20), "A", 140, "OK"),
      ]),
    );
    fx.transport.respond_ok(
      "contest.standings?contestId=10&from=1&count=1&showUnofficial=false",
      standings_json(10, &["A", "B", "C", "D"]),
    );
    fx.transport.respond_failed(
      "contest.standings?contestId=20&from=1&count=1&showUnofficial=false",
      "contestId: Contest with id 20 has not started",
    );

    let details = fetch_contest_details(&fx.client, "ada", &[c10, c20], false)
      .await
      .unwrap();

    assert_eq!(details[0].solved, 2);
    assert_eq!(details[0].unsolved, 2);
    assert_eq!(details[0].total, 4);
    assert_eq!(details[0].details_error, None);
    assert_eq!(details[1].solved, 0);
    assert_eq!(details[1].unsolved, 0);
    assert_eq!(details[1].total, 0);
    assert!(details[1].details_error.is_some());
    assert_eq!(details[1].delta(), -40);
  }

  #[tokio::test]
  async fn test_fetch_details_keeps_total_when_solves_exceed_standings() {
    let fx = testing::fixture();
    let c10 = change(10, 3, 1500, 1540);
    // A1 and A2 were merged into A in the standings after the contest
    fx.transport.respond_ok(
      "user.status?handle=ada&from=1&count=2000",
      json!([
        submission_json(1, Some(10), "A1", 100, "OK"),
        submission_json(2, Some(10), "A2", 110, "OK"),
        submission_json(3, Some(10), "B", 120, "OK"),
      ]),
    );
    fx.transport.respond_ok(
      "contest.standings?contestId=10&from=1&count=1&showUnofficial=false",
      standings_json(10, &["A", "B"]),
    );

    let details = fetch_contest_details(&fx.client, "ada", &[c10], false)
      .await
      .unwrap();

    assert_eq!(details[0].solved, 3);
    assert_eq!(details[0].unsolved, 0);
    assert_eq!(details[0].total, 2);
  }

  #[tokio::test]
  async fn test_fetch_details_submission_failure_fails_batch() {
    let fx = testing::fixture();
    let batch = vec![change(10, 3, 1500, 1540)];

    let result = fetch_contest_details(&fx.client, "ada", &batch, false).await;

    assert!(result.is_err());
    assert_eq!(fx.transport.calls().len(), 1);
  }

  #[tokio::test]
  async fn test_empty_batch_makes_no_request() {
    let fx = testing::fixture();
    let details = fetch_contest_details(&fx.client, "ada", &[], false).await.unwrap();
    assert!(details.is_empty());
    assert!(fx.transport.calls().is_empty());
  }
}
