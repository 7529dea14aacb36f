//! Problem-solving statistics over a window of recent submissions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::codeforces::{Problem, Submission};

/// Recent submissions fetched for problem stats.
pub const STATS_SUBMISSION_COUNT: usize = 3000;

const RATING_BUCKETS: [i32; 14] = [
  800, 1000, 1200, 1400, 1600, 1800, 2000, 2200, 2400, 2600, 2800, 3000, 3200, 3500,
];
const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProblemWindow {
  Days7,
  #[default]
  Days30,
  Days90,
}

impl ProblemWindow {
  pub const ALL: [ProblemWindow; 3] = [Self::Days7, Self::Days30, Self::Days90];

  pub fn days(self) -> i64 {
    match self {
      Self::Days7 => 7,
      Self::Days30 => 30,
      Self::Days90 => 90,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Days7 => "Last 7 days",
      Self::Days30 => "Last 30 days",
      Self::Days90 => "Last 90 days",
    }
  }

  pub fn next(self) -> Self {
    match self {
      Self::Days7 => Self::Days30,
      Self::Days30 => Self::Days90,
      Self::Days90 => Self::Days7,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingBucket {
  pub label: String,
  pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProblemStats {
  pub most_difficult: Option<i32>,
  pub total_solved: usize,
  /// Rounded mean rating of rated solved problems, 0 when there are none
  pub average_rating: i32,
  pub average_per_day: f64,
  pub buckets: Vec<RatingBucket>,
  /// Submissions of any verdict per UTC day
  pub heatmap: BTreeMap<NaiveDate, usize>,
  /// Most frequent tags among solved problems, by count then name
  pub top_tags: Vec<(String, usize)>,
  /// Submissions of any verdict inside the window
  pub submissions_in_window: usize,
}

impl ProblemStats {
  pub fn compute(submissions: &[Submission], window: ProblemWindow, now: DateTime<Utc>) -> Self {
    let cutoff = now - Duration::days(window.days());
    let recent: Vec<&Submission> = submissions
      .iter()
      .filter(|s| s.created_at() > cutoff)
      .collect();

    let solved = unique_solved(&recent);
    let ratings: Vec<i32> = solved.iter().filter_map(|p| p.rating).collect();

    let most_difficult = ratings.iter().copied().max();
    let average_rating = if ratings.is_empty() {
      0
    } else {
      let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
      (sum as f64 / ratings.len() as f64).round() as i32
    };
    let average_per_day = (solved.len() as f64 / window.days() as f64 * 100.0).round() / 100.0;

    let mut heatmap = BTreeMap::new();
    for submission in &recent {
      *heatmap.entry(submission.created_at().date_naive()).or_insert(0) += 1;
    }

    Self {
      most_difficult,
      total_solved: solved.len(),
      average_rating,
      average_per_day,
      buckets: rating_buckets(&ratings),
      heatmap,
      top_tags: top_tags(&solved),
      submissions_in_window: recent.len(),
    }
  }
}

/// Accepted problems, one per `(contest, index)`, keeping the highest rating seen.
fn unique_solved<'a>(submissions: &[&'a Submission]) -> Vec<&'a Problem> {
  let mut order: Vec<(Option<u64>, &str)> = Vec::new();
  let mut solved: HashMap<(Option<u64>, &str), &'a Problem> = HashMap::new();

  for submission in submissions.iter().filter(|s| s.is_accepted()) {
    let problem = &submission.problem;
    let key = (problem.contest_id, problem.index.as_str());
    match solved.get(&key) {
      None => {
        order.push(key);
        solved.insert(key, problem);
      }
      Some(existing) => {
        if let Some(rating) = problem.rating {
          if existing.rating.map_or(true, |r| rating > r) {
            solved.insert(key, problem);
          }
        }
      }
    }
  }

  order.iter().filter_map(|key| solved.get(key).copied()).collect()
}

fn bucket_label(index: usize) -> String {
  match RATING_BUCKETS.get(index + 1) {
    Some(upper) => format!("{}-{}", RATING_BUCKETS[index], upper - 1),
    None => format!("{}+", RATING_BUCKETS[index]),
  }
}

fn rating_buckets(ratings: &[i32]) -> Vec<RatingBucket> {
  let mut counts = vec![0; RATING_BUCKETS.len()];
  for &rating in ratings {
    // Below the lowest bucket: not counted
    if let Some(index) = RATING_BUCKETS.iter().rposition(|&lower| rating >= lower) {
      counts[index] += 1;
    }
  }

  counts
    .into_iter()
    .enumerate()
    .map(|(index, count)| RatingBucket {
      label: bucket_label(index),
      count,
    })
    .collect()
}

fn top_tags(solved: &[&Problem]) -> Vec<(String, usize)> {
  let mut counts: HashMap<&str, usize> = HashMap::new();
  for problem in solved {
    for tag in &problem.tags {
      *counts.entry(tag.as_str()).or_insert(0) += 1;
    }
  }

  let mut tags: Vec<(String, usize)> = counts
    .into_iter()
    .map(|(tag, count)| (tag.to_string(), count))
    .collect();
  tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
  tags.truncate(MAX_TAGS);
  tags
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::rated_submission;

  const DAY: i64 = 86_400;

  fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
  }

  fn ago(days: i64) -> i64 {
    now().timestamp() - days * DAY
  }

  #[test]
  fn test_empty() {
    let stats = ProblemStats::compute(&[], ProblemWindow::Days30, now());
    assert_eq!(stats.total_solved, 0);
    assert_eq!(stats.most_difficult, None);
    assert_eq!(stats.average_rating, 0);
    assert_eq!(stats.average_per_day, 0.0);
    assert_eq!(stats.buckets.len(), 14);
    assert!(stats.buckets.iter().all(|b| b.count == 0));
    assert!(stats.heatmap.is_empty());
  }

  #[test]
  fn test_unique_solved_keeps_highest_rating() {
    let subs = vec![
      rated_submission(1, Some(5), "A", ago(1), "OK", None, &["math"]),
      rated_submission(2, Some(5), "A", ago(1), "OK", Some(1300), &["math", "greedy"]),
      rated_submission(3, None, "A", ago(2), "OK", Some(1700), &["dp"]),
      rated_submission(4, Some(6), "B", ago(2), "WRONG_ANSWER", Some(2500), &["graphs"]),
    ];

    let stats = ProblemStats::compute(&subs, ProblemWindow::Days30, now());

    assert_eq!(stats.total_solved, 2);
    assert_eq!(stats.most_difficult, Some(1700));
    assert_eq!(stats.average_rating, 1500);
    assert_eq!(stats.average_per_day, 0.07);
    assert_eq!(stats.submissions_in_window, 4);
    assert_eq!(
      stats.top_tags,
      vec![
        ("dp".to_string(), 1),
        ("greedy".to_string(), 1),
        ("math".to_string(), 1),
      ]
    );
  }

  #[test]
  fn test_window_excludes_old_submissions() {
    let subs = vec![
      rated_submission(1, Some(1), "A", ago(3), "OK", Some(800), &[]),
      rated_submission(2, Some(1), "B", ago(10), "OK", Some(900), &[]),
    ];

    assert_eq!(ProblemStats::compute(&subs, ProblemWindow::Days7, now()).total_solved, 1);
    assert_eq!(ProblemStats::compute(&subs, ProblemWindow::Days30, now()).total_solved, 2);
  }

  #[test]
  fn test_buckets() {
    let subs = vec![
      rated_submission(1, Some(1), "A", ago(1), "OK", Some(700), &[]),
      rated_submission(2, Some(1), "B", ago(1), "OK", Some(999), &[]),
      rated_submission(3, Some(1), "C", ago(1), "OK", Some(1000), &[]),
      rated_submission(4, Some(1), "D", ago(1), "OK", Some(3499), &[]),
      rated_submission(5, Some(1), "E", ago(1), "OK", Some(3500), &[]),
    ];

    let stats = ProblemStats::compute(&subs, ProblemWindow::Days30, now());
    let counts: HashMap<&str, usize> = stats
      .buckets
      .iter()
      .map(|b| (b.label.as_str(), b.count))
      .collect();

    assert_eq!(stats.buckets[0].label, "800-999");
    assert_eq!(stats.buckets[13].label, "3500+");
    assert_eq!(counts["800-999"], 1);
    assert_eq!(counts["1000-1199"], 1);
    assert_eq!(counts["3200-3499"], 1);
    assert_eq!(counts["3500+"], 1);
    assert_eq!(stats.buckets.iter().map(|b| b.count).sum::<usize>(), 4);
  }

  #[test]
  fn test_heatmap_counts_all_verdicts_by_utc_day() {
    let day = ago(2) - ago(2) % DAY;
    let subs = vec![
      rated_submission(1, Some(1), "A", day + 10, "WRONG_ANSWER", None, &[]),
      rated_submission(2, Some(1), "A", day + 20, "OK", None, &[]),
      rated_submission(3, Some(1), "B", day + DAY + 5, "OK", None, &[]),
    ];

    let stats = ProblemStats::compute(&subs, ProblemWindow::Days30, now());
    let counts: Vec<usize> = stats.heatmap.values().copied().collect();
    assert_eq!(counts, vec![2, 1]);
  }

  #[test]
  fn test_top_tags_limited_to_ten() {
    let tags = [
      "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l",
    ];
    let subs: Vec<Submission> = tags
      .iter()
      .enumerate()
      .map(|(i, _)| {
        rated_submission(i as u64, Some(1), &format!("P{}", i), ago(1), "OK", None, &tags[..=i])
      })
      .collect();

    let stats = ProblemStats::compute(&subs, ProblemWindow::Days30, now());

    assert_eq!(stats.top_tags.len(), 10);
    assert_eq!(stats.top_tags[0], ("a".to_string(), 12));
    assert_eq!(stats.top_tags[9], ("j".to_string(), 3));
  }
}
