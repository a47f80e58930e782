//! # Reference Data Cache
//!
//! Keeps a serialized snapshot of the published reference data in a shared
//! key-value store so API workers never query the search index directly.
//!
//! - [`store`] defines the store contract with an in-process and a Redis
//!   implementation.
//! - [`coordinator`] elects a single populator across processes, both on
//!   startup and when a reader finds the cache empty.

mod errors;
mod source;

pub mod coordinator;
pub mod store;

pub use coordinator::{
    CacheCoordinator, CoordinatorConfig, ReloadOutcome, StartupOutcome, REFERENCE_DATA_KEY,
    RELOAD_FLAG_KEY, STARTUP_LOCK_KEY,
};
pub use errors::CacheError;
pub use source::{ReferenceDataSource, SearchIndexSource};
pub use store::{CacheStore, GetOrSet, MemoryCacheStore, RedisCacheStore};
