//! Codeforces public API access.

pub mod api_types;
mod cached_client;
mod client;
mod endpoint;
mod error;

pub use api_types::{Problem, RatingChange, Submission, UserInfo, Verdict};
pub use cached_client::CachedCodeforcesClient;
pub use client::{CodeforcesClient, HttpTransport, RawResponse, Transport};
pub use endpoint::{path_references_handle, Endpoint};
pub use error::ApiError;
