//! Error types for the store layer

use thiserror::Error;

/// Store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store not provisioned")]
    NotReady,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind}: {id}"))
    }

    /// True when the error is a uniqueness-constraint collision, which
    /// ingestion treats as "duplicate submission", not a failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
