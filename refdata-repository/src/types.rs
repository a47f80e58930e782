//! Request and response types for search index operations.

use serde_json::Value;

/// One document to write into an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    /// Document `_id`.
    pub id: String,
    /// Document `_source`.
    pub body: Value,
}

impl IndexDocument {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

/// A single failed item of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemError {
    /// Document `_id` of the failed item.
    pub id: String,
    /// Reason reported by the search engine.
    pub reason: String,
}

/// Summary of a bulk index request.
///
/// The search engine may accept a bulk request while rejecting some of its
/// items, so callers must check [`BulkIndexSummary::is_complete`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkIndexSummary {
    /// Total number of items in the request.
    pub total: usize,
    /// Number of items indexed.
    pub succeeded: usize,
    /// Number of items rejected.
    pub failed: usize,
    /// Details of rejected items.
    pub errors: Vec<BulkItemError>,
}

impl BulkIndexSummary {
    /// Summary of a request where every item succeeded.
    pub fn all_succeeded(total: usize) -> Self {
        Self {
            total,
            succeeded: total,
            failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }
}
