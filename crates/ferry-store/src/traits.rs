//! Store abstraction trait
//!
//! All store backends must implement [`KeyValueStore`]. Expiry is the
//! backend's responsibility: a key past its TTL behaves exactly like an
//! absent key on every operation.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only view of an entry's consumption state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStatus {
    pub consumed: bool,
}

/// Key-value store with per-item expiration and single-use consumption.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Insert or replace a value. `None` means the entry never expires.
    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()>;

    /// Fetch a live value. Expired entries read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Remove an entry. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomic check-and-set for single-use keys.
    ///
    /// Returns `true` exactly once per live key: the first caller flips the
    /// consumed bit (creating a marker entry when the key is absent) and every
    /// later caller gets `false` until the entry expires out of the store.
    async fn consume_if_unused(&self, key: &str) -> StoreResult<bool>;

    /// Read-only probe of a live entry's consumption state. Never consumes.
    async fn status(&self, key: &str) -> StoreResult<Option<EntryStatus>>;
}
