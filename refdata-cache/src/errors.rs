//! Error types for the reference data cache.

use thiserror::Error;

const UNAVAILABLE: &str = "Reference data is temporarily unavailable";

/// Errors that can occur while reading or populating the shared cache.
///
/// The two unavailability variants render the same message; details of
/// the failure are kept for logs only.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The key-value store could not be reached or rejected a command.
    #[error("Cache store error: {0}")]
    StoreError(String),

    /// A cached value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Reading the search index failed.
    #[error("Reference data source error: {0}")]
    SourceError(String),

    /// A reload attempted by this caller failed.
    #[error("{UNAVAILABLE}")]
    ReloadFailed { cause: String },

    /// Another process kept reloading past the read retry budget.
    #[error("{UNAVAILABLE}")]
    RetryBudgetExhausted,
}

impl CacheError {
    pub fn store(msg: impl ToString) -> Self {
        Self::StoreError(msg.to_string())
    }

    pub fn serialization(msg: impl ToString) -> Self {
        Self::SerializationError(msg.to_string())
    }

    pub fn source(msg: impl ToString) -> Self {
        Self::SourceError(msg.to_string())
    }

    pub fn reload_failed(cause: impl ToString) -> Self {
        Self::ReloadFailed {
            cause: cause.to_string(),
        }
    }

    /// True for the errors callers should surface as "service unavailable".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CacheError::ReloadFailed { .. } | CacheError::RetryBudgetExhausted
        )
    }

    /// HTTP status code an API layer should answer with.
    pub fn status_code(&self) -> u16 {
        if self.is_unavailable() {
            503
        } else {
            500
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::StoreError(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}
