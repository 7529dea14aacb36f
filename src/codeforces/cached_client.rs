//! Cached Codeforces client that wraps CodeforcesClient with transparent caching.

use serde::de::DeserializeOwned;

use crate::cache::CacheLayer;
use crate::store::KeyValueStore;

use super::api_types::{Problem, RatingChange, StandingsResult, Submission, UserInfo};
use super::client::{CodeforcesClient, Transport};
use super::endpoint::Endpoint;
use super::error::ApiError;

/// Codeforces client with transparent caching.
///
/// Every read goes through the cache first; `force` drops the cached entry and
/// refetches. Only requests that miss the cache pay the rate-limit delay.
pub struct CachedCodeforcesClient<S: KeyValueStore, T: Transport> {
  inner: CodeforcesClient<T>,
  cache: CacheLayer<S>,
}

impl<S: KeyValueStore, T: Transport> CachedCodeforcesClient<S, T> {
  pub fn new(inner: CodeforcesClient<T>, cache: CacheLayer<S>) -> Self {
    Self { inner, cache }
  }

  /// The cache this client reads through.
  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  async fn fetch<R: DeserializeOwned>(&self, endpoint: Endpoint, force: bool) -> Result<R, ApiError> {
    let path = endpoint.path();
    let result = self
      .cache
      .fetch(&path, force, || self.inner.get(&path))
      .await?;

    Ok(result.data)
  }

  /// Profile info for the given handles. An empty list makes no request.
  pub async fn user_info(&self, handles: &[String], force: bool) -> Result<Vec<UserInfo>, ApiError> {
    if handles.is_empty() {
      return Ok(Vec::new());
    }

    self
      .fetch(
        Endpoint::UserInfo {
          handles: handles.to_vec(),
        },
        force,
      )
      .await
  }

  /// Rated contest history for a handle, in API order (oldest first).
  pub async fn rating_history(&self, handle: &str, force: bool) -> Result<Vec<RatingChange>, ApiError> {
    self
      .fetch(
        Endpoint::UserRating {
          handle: handle.to_string(),
        },
        force,
      )
      .await
  }

  /// The `count` most recent submissions for a handle.
  pub async fn submissions(
    &self,
    handle: &str,
    count: usize,
    force: bool,
  ) -> Result<Vec<Submission>, ApiError> {
    self
      .fetch(
        Endpoint::UserStatus {
          handle: handle.to_string(),
          count,
        },
        force,
      )
      .await
  }

  /// Problem list of a contest, tagged with the contest id.
  pub async fn contest_problems(&self, contest_id: u64, force: bool) -> Result<Vec<Problem>, ApiError> {
    let standings: StandingsResult = self
      .fetch(Endpoint::ContestStandings { contest_id }, force)
      .await?;

    Ok(
      standings
        .problems
        .into_iter()
        .map(|p| Problem {
          contest_id: Some(contest_id),
          ..p
        })
        .collect(),
    )
  }
}

impl<S: KeyValueStore, T: Transport> Clone for CachedCodeforcesClient<S, T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
    }
  }
}
