//! Keyed store abstraction.
//!
//! Sessions live in a fast keyed store with per-key expiry and set values,
//! the same primitives a Redis-style server offers. The [`KeyValueStore`]
//! trait keeps the session directory independent from the backend; the
//! crate ships [`MemoryStore`] for single-process deployments and tests.
//!
//! # Atomicity
//!
//! Implementations must apply every single call atomically. In particular
//! [`KeyValueStore::set_add`] is additive (concurrent adds never lose a
//! member) and [`KeyValueStore::delete`] removes all given keys as one batch.

mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;

/// Operations the session directory needs from a keyed store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a text value. Expired and missing keys both yield `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a text value that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Add `member` to the set at `key`, creating the set if needed.
    ///
    /// Returns `true` if the member was not present before.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Read every member of the set at `key` (empty if the key is missing).
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Delete all `keys` in one batch. Missing keys are ignored.
    ///
    /// Returns the number of keys that existed.
    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
