//! Shared key-value store contract.
//!
//! Every worker process talks to the same store. The only coordination
//! primitive is [`CacheStore::get_or_set`], which must be atomic across
//! processes.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::CacheError;

pub use self::memory::MemoryCacheStore;
pub use self::redis_store::RedisCacheStore;

/// Result of [`CacheStore::get_or_set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrSet {
    /// The value stored under the key after the call.
    pub value: String,
    /// True when the key already existed and nothing was written.
    pub was_present: bool,
}

impl GetOrSet {
    pub fn inserted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            was_present: false,
        }
    }

    pub fn existing(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            was_present: true,
        }
    }
}

/// Key-value store with expiring keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value, replacing any previous one. `None` never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Store `value` with `ttl` only if the key is absent, in one atomic step.
    ///
    /// Among concurrent callers on an absent key exactly one sees
    /// `was_present == false`.
    async fn get_or_set(&self, key: &str, value: &str, ttl: Duration)
        -> Result<GetOrSet, CacheError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
