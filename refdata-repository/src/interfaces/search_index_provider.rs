//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, in-memory mocks, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{BulkIndexSummary, IndexDocument};

/// Abstracts the underlying search index implementation.
///
/// The reference data pipeline only ever replaces whole data types, so the
/// contract is limited to index management, delete-by-type, bulk insert and
/// a full read-back.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create an index with the given settings and mappings.
    ///
    /// # Arguments
    ///
    /// * `index` - Name of the index
    /// * `schema` - Settings and mappings body
    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), SearchIndexError>;

    /// Delete an index. Deleting a missing index is not an error.
    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError>;

    /// Delete every document of one data type inside an index.
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Number of deleted documents
    /// * `Err(SearchIndexError::DeleteError)` - If the request fails
    async fn delete_by_query(&self, index: &str, data_type: &str) -> Result<u64, SearchIndexError>;

    /// Index documents in a single bulk request, keyed by their ids.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkIndexSummary)` - Per-item outcome of the request
    /// * `Err(SearchIndexError)` - If the request fails entirely
    async fn bulk_index(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<BulkIndexSummary, SearchIndexError>;

    /// Read the `_source` of every document in an index.
    async fn fetch_all(&self, index: &str) -> Result<Vec<Value>, SearchIndexError>;

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}
