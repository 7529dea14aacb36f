/// Failures of a Codeforces API read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
  /// The request never produced an HTTP response.
  #[error("Network error: {0}")]
  Transport(String),
  /// Non-success HTTP status; `comment` is the remote diagnostic, if any.
  #[error("Codeforces API error: {status} {reason}. {comment}")]
  Http {
    status: u16,
    reason: String,
    comment: String,
  },
  /// The payload's `status` field was not `OK`.
  #[error("Codeforces API error: {0}")]
  Remote(String),
  /// The payload could not be decoded into the expected shape.
  #[error("Failed to decode Codeforces response: {0}")]
  Decode(String),
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    Self::Decode(err.to_string())
  }
}
