//! Error types for the reference data repository.

mod search_index_error;

pub use search_index_error::SearchIndexError;
