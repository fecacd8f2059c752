//! Specification store subsystem.
//!
//! # Data Flow
//! ```text
//! Store side:
//!     specifications file (JSON)
//!     → store.rs (validate, index by identifier)
//!     → served by http::spec_api (GET /specification)
//!     → watcher.rs (file change → atomic table swap)
//!
//! Engine side:
//!     identifier
//!     → client.rs (GET /specification?identifier=, bounded timeout)
//!     → DieSpecification | LookupError
//! ```
//!
//! # Design Decisions
//! - `SpecificationSource` is the seam between the engine and the store
//! - The store is read-mostly: readers take a snapshot, reloads swap it whole
//! - Every lookup failure cause is kept here; the engine folds them

pub mod client;
pub mod store;
pub mod watcher;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::dice::DieSpecification;
use crate::observability::TraceContext;

pub use client::SpecificationClient;
pub use store::{SpecificationStore, StoreError};
pub use watcher::SpecificationWatcher;

/// Why a specification lookup did not produce a specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    /// The store has no die with this identifier.
    #[error("die not found")]
    NotFound,

    /// The store did not answer within the bound.
    #[error("lookup timed out after {0:?}")]
    TimedOut(Duration),

    /// The store could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The store answered with a status other than 200 or 404.
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The store answered 200 with a body that is not a valid specification.
    #[error("malformed specification: {0}")]
    Malformed(String),
}

impl LookupError {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            LookupError::NotFound => "not_found",
            LookupError::TimedOut(_) => "timeout",
            LookupError::Connection(_) => "connection_error",
            LookupError::UnexpectedStatus(_) => "error_status",
            LookupError::Malformed(_) => "malformed",
        }
    }
}

/// Somewhere the engine can resolve die specifications from.
pub trait SpecificationSource: Send + Sync {
    fn fetch(
        &self,
        identifier: &str,
        ctx: &TraceContext,
    ) -> impl Future<Output = Result<DieSpecification, LookupError>> + Send;
}
