use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::ApiEnvelope;
use super::error::ApiError;

/// Raw HTTP response as seen by the client.
#[derive(Debug, Clone)]
pub struct RawResponse {
  pub status: u16,
  pub reason: String,
  pub body: String,
}

/// Performs a GET against the API for an endpoint path.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, path: &str) -> Result<RawResponse, ApiError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
    let base_url = Url::parse(base_url)
      .map_err(|e| ApiError::Transport(format!("Invalid API base URL {}: {}", base_url, e)))?;

    let client = reqwest::Client::builder()
      .gzip(true)
      .timeout(timeout)
      .build()
      .map_err(|e| ApiError::Transport(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self { client, base_url })
  }
}

fn join_url(base: &Url, path: &str) -> String {
  format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, path: &str) -> Result<RawResponse, ApiError> {
    let response = self
      .client
      .get(join_url(&self.base_url, path))
      .send()
      .await
      .map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| ApiError::Transport(e.to_string()))?;

    Ok(RawResponse {
      status: status.as_u16(),
      reason: status.canonical_reason().unwrap_or_default().to_string(),
      body,
    })
  }
}

/// Codeforces API client.
///
/// Sleeps for a fixed delay before every request to stay under the API's
/// rate limit. Callers await requests one at a time, so the delay serializes
/// them; there is no other limiter and no retry.
pub struct CodeforcesClient<T: Transport> {
  transport: Arc<T>,
  request_delay: Duration,
}

impl<T: Transport> CodeforcesClient<T> {
  pub fn new(transport: T, request_delay: Duration) -> Self {
    Self {
      transport: Arc::new(transport),
      request_delay,
    }
  }

  /// Fetch an endpoint and return the envelope's `result`.
  pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
    tokio::time::sleep(self.request_delay).await;

    debug!(path, "Requesting Codeforces API");
    let response = self.transport.get(path).await?;
    decode_response(response)
  }
}

impl<T: Transport> Clone for CodeforcesClient<T> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      request_delay: self.request_delay,
    }
  }
}

/// Unwrap the API envelope, mapping failures to [`ApiError`].
fn decode_response(response: RawResponse) -> Result<Value, ApiError> {
  if !(200..300).contains(&response.status) {
    let comment = match serde_json::from_str::<ApiEnvelope>(&response.body) {
      Ok(envelope) => envelope.comment.unwrap_or_default(),
      Err(_) => format!("Failed to parse error response: {}", response.body),
    };
    return Err(ApiError::Http {
      status: response.status,
      reason: response.reason,
      comment,
    });
  }

  let envelope: ApiEnvelope =
    serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))?;

  if envelope.status != "OK" {
    return Err(ApiError::Remote(
      envelope
        .comment
        .unwrap_or_else(|| "Unknown error".to_string()),
    ));
  }

  envelope
    .result
    .ok_or_else(|| ApiError::Decode("response has no result".to_string()))
}
