//! Test doubles and fixtures shared across modules.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::codeforces::{
  ApiError, CachedCodeforcesClient, RawResponse, Submission, Transport,
};
use crate::config::Config;
use crate::store::MemoryStore;
use crate::tracker::Tracker;

#[derive(Default)]
struct FakeState {
  responses: HashMap<String, Result<RawResponse, ApiError>>,
  calls: Vec<String>,
}

/// Scripted transport. Unscripted paths fail with a transport error; every
/// request is recorded, scripted or not.
#[derive(Clone, Default)]
pub struct FakeTransport {
  state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
  pub fn new() -> Self {
    Self::default()
  }

  fn script(&self, path: &str, response: Result<RawResponse, ApiError>) {
    self
      .state
      .lock()
      .unwrap()
      .responses
      .insert(path.to_string(), response);
  }

  /// Answer `path` with a successful envelope around `result`.
  pub fn respond_ok(&self, path: &str, result: Value) {
    let body = json!({ "status": "OK", "result": result }).to_string();
    self.script(
      path,
      Ok(RawResponse {
        status: 200,
        reason: "OK".to_string(),
        body,
      }),
    );
  }

  /// Answer `path` the way the API rejects a bad request.
  pub fn respond_failed(&self, path: &str, comment: &str) {
    let body = json!({ "status": "FAILED", "comment": comment }).to_string();
    self.script(
      path,
      Ok(RawResponse {
        status: 400,
        reason: "Bad Request".to_string(),
        body,
      }),
    );
  }

  pub fn respond_transport_error(&self, path: &str, message: &str) {
    self.script(path, Err(ApiError::Transport(message.to_string())));
  }

  pub fn calls(&self) -> Vec<String> {
    self.state.lock().unwrap().calls.clone()
  }

  pub fn call_count(&self, path: &str) -> usize {
    self
      .state
      .lock()
      .unwrap()
      .calls
      .iter()
      .filter(|c| c.as_str() == path)
      .count()
  }
}

#[async_trait]
impl Transport for FakeTransport {
  async fn get(&self, path: &str) -> Result<RawResponse, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(path.to_string());
    state
      .responses
      .get(path)
      .cloned()
      .unwrap_or_else(|| Err(ApiError::Transport(format!("no response scripted for {}", path))))
  }
}

/// Services over an in-memory store and a fake transport, with no request delay.
pub struct Fixture {
  pub store: Arc<MemoryStore>,
  pub transport: FakeTransport,
  pub client: CachedCodeforcesClient<MemoryStore, FakeTransport>,
  pub tracker: Tracker<MemoryStore, FakeTransport>,
}

pub fn fixture() -> Fixture {
  fixture_with_store(MemoryStore::new())
}

pub fn fixture_with_store(store: MemoryStore) -> Fixture {
  build_fixture(store, 0)
}

/// Like [`fixture`], with a real delay before every request so tests can act
/// while a sync is in flight.
pub fn fixture_with_delay(request_delay_ms: u64) -> Fixture {
  build_fixture(MemoryStore::new(), request_delay_ms)
}

fn build_fixture(store: MemoryStore, request_delay_ms: u64) -> Fixture {
  let mut config = Config::default();
  config.codeforces.request_delay_ms = request_delay_ms;

  let store = Arc::new(store);
  let transport = FakeTransport::new();
  let tracker = Tracker::new(Arc::clone(&store), transport.clone(), &config);

  Fixture {
    store,
    transport,
    client: tracker.client.clone(),
    tracker,
  }
}

pub fn user_json(handle: &str, rating: Option<i32>, max_rating: Option<i32>) -> Value {
  let mut user = json!({ "handle": handle, "rank": "specialist" });
  if let Some(rating) = rating {
    user["rating"] = json!(rating);
  }
  if let Some(max_rating) = max_rating {
    user["maxRating"] = json!(max_rating);
  }
  user
}

pub fn submission_json(id: u64, contest_id: Option<u64>, index: &str, seconds: i64, verdict: &str) -> Value {
  rated_submission_json(id, contest_id, index, seconds, verdict, None, &[])
}

pub fn rated_submission_json(
  id: u64,
  contest_id: Option<u64>,
  index: &str,
  seconds: i64,
  verdict: &str,
  rating: Option<i32>,
  tags: &[&str],
) -> Value {
  let mut problem = json!({
    "index": index,
    "name": format!("Problem {}", index),
    "type": "PROGRAMMING",
    "tags": tags,
  });
  if let Some(contest_id) = contest_id {
    problem["contestId"] = json!(contest_id);
  }
  if let Some(rating) = rating {
    problem["rating"] = json!(rating);
  }

  let mut submission = json!({
    "id": id,
    "creationTimeSeconds": seconds,
    "problem": problem,
    "programmingLanguage": "GNU C++17",
    "verdict": verdict,
    "passedTestCount": 10,
    "timeConsumedMillis": 15,
    "memoryConsumedBytes": 0,
  });
  if let Some(contest_id) = contest_id {
    submission["contestId"] = json!(contest_id);
  }
  submission
}

/// A decoded submission on contest 1.
pub fn submission(id: u64, verdict: &str, seconds: i64) -> Submission {
  let index = format!("P{}", id);
  serde_json::from_value(submission_json(id, Some(1), &index, seconds, verdict)).unwrap()
}

pub fn rated_submission(
  id: u64,
  contest_id: Option<u64>,
  index: &str,
  seconds: i64,
  verdict: &str,
  rating: Option<i32>,
  tags: &[&str],
) -> Submission {
  serde_json::from_value(rated_submission_json(
    id, contest_id, index, seconds, verdict, rating, tags,
  ))
  .unwrap()
}

pub fn rating_change_json(contest_id: u64, seconds: i64, old_rating: i32, new_rating: i32) -> Value {
  json!({
    "contestId": contest_id,
    "contestName": format!("Codeforces Round {}", contest_id),
    "handle": "ada",
    "rank": 100,
    "ratingUpdateTimeSeconds": seconds,
    "oldRating": old_rating,
    "newRating": new_rating,
  })
}

/// `contest.standings` result listing `indices` as the contest's problems.
pub fn standings_json(contest_id: u64, indices: &[&str]) -> Value {
  let problems: Vec<Value> = indices
    .iter()
    .map(|index| json!({ "contestId": contest_id, "index": index, "name": index, "type": "PROGRAMMING", "tags": [] }))
    .collect();
  json!({
    "contest": { "id": contest_id, "name": format!("Codeforces Round {}", contest_id) },
    "problems": problems,
    "rows": [],
  })
}
