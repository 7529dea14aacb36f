//! Key-value persistence port.
//!
//! Everything the application keeps between runs (the roster, sync settings,
//! the last global sync time and cached API responses) goes through
//! [`KeyValueStore`], so the backing store can be swapped in tests.

#[cfg(test)]
mod memory;
mod sqlite;
mod traits;

#[cfg(test)]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, StoreError};
