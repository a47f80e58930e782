//! # Reference Data Repository
//!
//! This crate provides the search index contract used by the reference data
//! pipeline and cache coordinator, together with a concrete implementation
//! for OpenSearch.

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use opensearch::{
    organization_data_schema, reference_data_schema, IndexSpec, OpenSearchClient,
    ORGANIZATION_DATA_INDEX, REFERENCE_DATA_INDEX,
};
pub use types::{BulkIndexSummary, BulkItemError, IndexDocument};
