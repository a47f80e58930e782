//! # Reference Data Shared
//!
//! Shared data model for the reference data synchronization system.
//!
//! Every harvested term, whatever its source, is normalized into one of the
//! [`ReferenceEntry`] variants before it reaches the search index. The same
//! types are read back out of the index and packed into a [`CacheBlob`] for
//! the API workers.

mod cache_blob;
mod entry;
mod label;

pub use cache_blob::{CacheBlob, ORGANIZATION_DATA_KEY};
pub use entry::{
    default_scheme, doc_id, EntryCore, OrganizationUnit, ReferenceEntry, VocabularyTerm,
    ORGANIZATION_DATA_TYPE, ORGANIZATION_URI_BASE,
};
pub use label::{LabelMap, UNDETERMINED};
