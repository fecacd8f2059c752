//! Dice rolling core.
//!
//! # Data Flow
//! ```text
//! RollRequest (identifier, optional count)
//!     → engine.rs (validate input)
//!     → SpecificationSource (resolve spec, bounded timeout)
//!     → single: one trial
//!       batch:  batch.rs fan-out of n trials, joined once
//!     → u32 | BatchRoll | RollError
//! ```
//!
//! # Design Decisions
//! - Specifications are immutable values for the duration of a request
//! - Trials share nothing but a borrowed specification
//! - Batch results are indexed by trial number, never by completion order

pub mod batch;
pub mod engine;
pub mod error;
pub mod types;

pub use engine::{check_batch_size, check_identifier, RollEngine, TrialOutcome};
pub use error::{RollError, RollResult};
pub use types::{
    is_valid_batch_size, validate_identifier, BatchRoll, DieSpecification, SpecError, SpecificationDocument,
    MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
