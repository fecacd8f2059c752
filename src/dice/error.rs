//! Roll engine error definitions.

use thiserror::Error;

use crate::specs::LookupError;

/// Errors surfaced by the roll engine to its callers.
#[derive(Debug, Error)]
pub enum RollError {
    /// Malformed identifier or batch size. Raised before any lookup or trial.
    #[error("{0}")]
    InvalidInput(String),

    /// The specification could not be obtained. Timeouts, connection
    /// failures and unknown identifiers all land here.
    #[error("Die service unavailable or die '{identifier}' not found")]
    SpecificationUnavailable {
        identifier: String,
        #[source]
        cause: LookupError,
    },

    /// A single roll hit its simulated fault.
    #[error("Die '{identifier}' failed!")]
    DieFailure { identifier: String },

    /// At least one trial in a batch hit its simulated fault.
    #[error("Batch roll failed: die '{identifier}' failed on roll(s) {failed:?} of {count}")]
    BatchFailure {
        identifier: String,
        count: usize,
        /// Indices of the failed trials, ascending.
        failed: Vec<usize>,
    },
}

/// Result type for roll engine operations.
pub type RollResult<T> = Result<T, RollError>;
