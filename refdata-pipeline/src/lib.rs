//! # Reference Data Pipeline
//!
//! This crate harvests controlled vocabularies and organization data from
//! their upstream sources and publishes them into the search index.
//!
//! ## Architecture
//!
//! The pipeline follows a Source-Publisher pattern:
//!
//! 1. **Sources**: One adapter per upstream source kind, each normalizing
//!    its data into [`refdata_shared::ReferenceEntry`] values
//! 2. **Publisher**: Replaces one data type's documents in the index
//! 3. **Orchestrator**: Runs every configured data type through both

pub mod catalog;
pub mod errors;
pub mod orchestrator;
pub mod publisher;
pub mod sources;

#[cfg(test)]
mod testing;

pub use catalog::{DataTypeCatalog, DataTypeConfig, SourceKind};
pub use errors::PipelineError;
pub use orchestrator::{DataTypeOutcome, Orchestrator, PipelineReport};
pub use publisher::{IndexPublisher, ReplaceSummary};
pub use sources::{RetryPolicy, SourceAdapter, SourceAdapters};
