//! Error types for the reference data pipeline.

use refdata_repository::SearchIndexError;
use thiserror::Error;

use crate::orchestrator::PipelineReport;

/// Errors that can occur in the reference data pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An upstream source never answered within its retry budget.
    #[error("Source unavailable for {data_type}: {message}")]
    SourceUnavailable { data_type: String, message: String },

    /// A source answered, but its content could not be used at all.
    #[error("Invalid source data for {data_type}: {message}")]
    SourceFormat { data_type: String, message: String },

    /// A single source record failed validation.
    #[error("Malformed {data_type} record {record}: {message}")]
    MalformedRow {
        data_type: String,
        record: String,
        message: String,
    },

    /// The data type is not in the catalog.
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    /// The adapter was handed a data type of another source kind.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Delete-by-query or bulk insert failed while replacing a data type.
    #[error("Index write failed for {data_type}: {source}")]
    IndexWrite {
        data_type: String,
        #[source]
        source: SearchIndexError,
    },

    /// Index management failed.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// One or more data types could not be replaced during a run.
    ///
    /// Carries the outcomes of every data type in the run.
    #[error("Replacing data types failed: {}", data_types.join(", "))]
    ReplaceFailed {
        data_types: Vec<String>,
        report: Box<PipelineReport>,
    },

    /// Organization reconciliation failed.
    #[error("Reconciliation error: {0}")]
    ReconcileError(String),

    /// Local I/O failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Per-data-type outcomes of the run that produced this error, if any.
    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            Self::ReplaceFailed { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }

    /// Create a source unavailable error.
    pub fn source_unavailable(data_type: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceUnavailable {
            data_type: data_type.into(),
            message: message.to_string(),
        }
    }

    /// Create a source format error.
    pub fn source_format(data_type: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceFormat {
            data_type: data_type.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed row error.
    pub fn malformed_row(
        data_type: impl Into<String>,
        record: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self::MalformedRow {
            data_type: data_type.into(),
            record: record.into(),
            message: message.to_string(),
        }
    }

    /// Create an index write error.
    pub fn index_write(data_type: impl Into<String>, source: SearchIndexError) -> Self {
        Self::IndexWrite {
            data_type: data_type.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a reconciliation error.
    pub fn reconcile(msg: impl ToString) -> Self {
        Self::ReconcileError(msg.to_string())
    }
}
