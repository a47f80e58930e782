//! # Reference Data Sync
//!
//! Entry point and configuration for the reference data synchronization
//! system. The binary wires the pipeline and the cache coordinator from
//! environment configuration and exposes them as subcommands.

pub mod cli;
pub mod config;

pub use cli::{Cli, Command};
pub use config::{Dependencies, SyncConfig};

use thiserror::Error;

/// Errors that can occur during startup or while running a command.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] refdata_pipeline::PipelineError),

    /// Search index error.
    #[error("Search error: {0}")]
    SearchError(#[from] refdata_repository::SearchIndexError),

    /// Cache error.
    #[error("Cache error: {0}")]
    CacheError(#[from] refdata_cache::CacheError),

    /// Output could not be rendered.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
