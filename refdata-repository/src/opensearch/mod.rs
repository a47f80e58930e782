//! OpenSearch implementation of the search index provider.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! using OpenSearch as the backend.

mod client;
mod index_config;
mod queries;

pub use client::OpenSearchClient;
pub use index_config::{
    organization_data_schema, reference_data_schema, IndexSpec, ORGANIZATION_DATA_INDEX,
    REFERENCE_DATA_INDEX,
};
