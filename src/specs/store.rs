//! In-memory specification table.
//!
//! # Responsibilities
//! - Hold identifier → specification, validated on load
//! - List identifiers in lexicographic order
//! - Replace the whole table atomically on reload

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::dice::{DieSpecification, SpecError, SpecificationDocument};
use crate::observability::{metrics, TraceContext};
use crate::specs::{LookupError, SpecificationSource};

type Table = BTreeMap<String, DieSpecification>;

/// Errors raised while loading a specifications file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read specifications file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in specifications file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid specification '{identifier}': {source}")]
    Invalid {
        identifier: String,
        #[source]
        source: SpecError,
    },
}

/// Thread-safe die specification table.
///
/// Readers load a snapshot without locking; `replace` swaps in a new table.
#[derive(Debug)]
pub struct SpecificationStore {
    table: ArcSwap<Table>,
}

impl SpecificationStore {
    /// Create a store holding the given specifications.
    pub fn new(specs: impl IntoIterator<Item = DieSpecification>) -> Self {
        let table = Self::index(specs);
        metrics::record_specs_loaded(table.len());
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    /// An empty store.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// The dice served when no file is configured.
    pub fn builtin() -> Self {
        Self::new(builtin_specifications())
    }

    /// Load from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let specs = read_specifications(path)?;
        tracing::info!(
            count = specs.len(),
            path = %path.display(),
            "Die specifications loaded"
        );
        Ok(Self::new(specs))
    }

    /// Re-read the file and swap the table. The current table is kept on error.
    pub fn reload_from_file(&self, path: &Path) -> Result<usize, StoreError> {
        let specs = read_specifications(path)?;
        Ok(self.replace(specs))
    }

    /// Swap in a new table. Returns the number of specifications now held.
    pub fn replace(&self, specs: impl IntoIterator<Item = DieSpecification>) -> usize {
        let table = Self::index(specs);
        let count = table.len();
        self.table.store(Arc::new(table));
        metrics::record_specs_loaded(count);
        count
    }

    /// All identifiers, sorted.
    pub fn list_identifiers(&self) -> Vec<String> {
        self.table.load().keys().cloned().collect()
    }

    pub fn get(&self, identifier: &str) -> Option<DieSpecification> {
        self.table.load().get(identifier).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(specs: impl IntoIterator<Item = DieSpecification>) -> Table {
        specs
            .into_iter()
            .map(|spec| (spec.identifier().to_string(), spec))
            .collect()
    }
}

impl SpecificationSource for SpecificationStore {
    async fn fetch(&self, identifier: &str, _ctx: &TraceContext) -> Result<DieSpecification, LookupError> {
        self.get(identifier).ok_or(LookupError::NotFound)
    }
}

/// Parse `{"<identifier>": {"faces": [...], "fault_probability": p}, ...}`.
pub fn parse_specifications(json: &str) -> Result<Vec<DieSpecification>, StoreError> {
    let documents: BTreeMap<String, SpecificationDocument> = serde_json::from_str(json)?;
    documents
        .into_iter()
        .map(|(identifier, doc)| {
            DieSpecification::from_document(identifier.clone(), doc)
                .map_err(|source| StoreError::Invalid { identifier, source })
        })
        .collect()
}

fn read_specifications(path: &Path) -> Result<Vec<DieSpecification>, StoreError> {
    let content = fs::read_to_string(path)?;
    parse_specifications(&content)
}

fn builtin_specifications() -> Vec<DieSpecification> {
    [
        ("fair", vec![1, 2, 3, 4, 5, 6], 0.0),
        ("risky", vec![2, 3, 4, 5, 6, 7], 0.1),
        ("extreme", vec![1, 1, 1, 6, 6, 6], 0.5),
    ]
    .into_iter()
    .filter_map(|(id, faces, p)| DieSpecification::new(id, faces, p).ok())
    .collect()
}
