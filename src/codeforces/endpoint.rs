//! Codeforces API endpoints and the cache keys derived from them.

/// A parameterized read against the Codeforces API.
///
/// The rendered path (see [`Endpoint::path`]) is also the cache key, so two
/// requests share a cache entry only when their paths match exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
  /// Profile info for one or more handles
  UserInfo { handles: Vec<String> },
  /// Rated contest history of a handle
  UserRating { handle: String },
  /// The `count` most recent submissions of a handle
  UserStatus { handle: String, count: usize },
  /// Contest standings, fetched only for the problem list
  ContestStandings { contest_id: u64 },
}

impl Endpoint {
  /// Path relative to the API base URL, including the query string.
  pub fn path(&self) -> String {
    match self {
      Self::UserInfo { handles } => format!("user.info?handles={}", handles.join(";")),
      Self::UserRating { handle } => format!("user.rating?handle={}", handle),
      Self::UserStatus { handle, count } => {
        format!("user.status?handle={}&from=1&count={}", handle, count)
      }
      Self::ContestStandings { contest_id } => format!(
        "contest.standings?contestId={}&from=1&count=1&showUnofficial=false",
        contest_id
      ),
    }
  }
}

/// Whether an endpoint path queries data for `handle` (case-insensitive).
///
/// Matches both `handle=<h>` and any entry of a `handles=<a>;<b>` list.
pub fn path_references_handle(path: &str, handle: &str) -> bool {
  let query = match path.split_once('?') {
    Some((_, query)) => query,
    None => return false,
  };

  query.split('&').any(|pair| match pair.split_once('=') {
    Some(("handle", value)) => value.eq_ignore_ascii_case(handle),
    Some(("handles", value)) => value.split(';').any(|h| h.eq_ignore_ascii_case(handle)),
    _ => false,
  })
}
