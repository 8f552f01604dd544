//! Error types for the engine layer
//!
//! Duplicate submissions and daily-limit breaches are not errors; they are
//! outcome statuses on [`crate::IngestOutcome`]. Downstream fan-out failures
//! are logged and swallowed so an already-committed award is never lost.

use thiserror::Error;

use ql_core::constants::outcome_codes;
use ql_store::StoreError;

/// Engine operation errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing or invalid user / required field; rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backing store not provisioned; distinct from a persistence failure
    #[error("Engine not ready: store not provisioned")]
    NotReady,

    /// A required write (event or ledger entry) failed
    #[error("Persistence error: {0}")]
    Persistence(StoreError),

    /// A referenced definition or row is missing
    #[error("Not found: {0}")]
    NotFound(String),
}

impl EngineError {
    /// Machine code for API responses, matching [`outcome_codes`]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotReady => outcome_codes::SERVICE_UNAVAILABLE,
            _ => outcome_codes::INTERNAL_ERROR,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotReady => Self::NotReady,
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Persistence(other),
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
