//! TTL cache for Codeforces API responses.
//!
//! Responses are kept in the application's key-value store under the
//! `cf_api_cache:` namespace, keyed by the exact endpoint path:
//! - Entries younger than the TTL are served without a network call
//! - Forced refreshes drop the entry before fetching
//! - Entries can be invalidated per endpoint, per handle, or all at once
//! - A full store triggers a small eviction and one retry; a failed cache
//!   write never fails the read

mod layer;
mod traits;

pub use layer::{CacheLayer, CACHE_PREFIX};
pub use traits::{CacheResult, CacheSource};
