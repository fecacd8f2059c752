//! Die specification and roll result types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest accepted batch.
pub const MIN_BATCH_SIZE: usize = 1;
/// Largest accepted batch.
pub const MAX_BATCH_SIZE: usize = 20;
/// Longest accepted die identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Reasons a specification is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("invalid identifier '{0}'")]
    Identifier(String),

    #[error("a die needs at least one face")]
    NoFaces,

    #[error("face at index {index} is {value}; faces must be positive")]
    NonPositiveFace { index: usize, value: i64 },

    #[error("fault probability {0} is outside [0, 1]")]
    FaultProbability(f64),
}

/// Wire and file form of a specification: `{"faces": [...], "fault_probability": p}`.
///
/// Faces are read as signed integers so that a zero or negative face is
/// reported as such rather than as a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationDocument {
    pub faces: Vec<i64>,
    #[serde(alias = "error_rate")]
    pub fault_probability: f64,
}

/// A named die: its faces and the probability that a trial fails.
#[derive(Debug, Clone, PartialEq)]
pub struct DieSpecification {
    identifier: String,
    faces: Vec<u32>,
    fault_probability: f64,
}

impl DieSpecification {
    pub fn new(
        identifier: impl Into<String>,
        faces: Vec<u32>,
        fault_probability: f64,
    ) -> Result<Self, SpecError> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        if faces.is_empty() {
            return Err(SpecError::NoFaces);
        }
        if let Some(index) = faces.iter().position(|&f| f == 0) {
            return Err(SpecError::NonPositiveFace { index, value: 0 });
        }
        // NaN fails this check as well.
        if !(0.0..=1.0).contains(&fault_probability) {
            return Err(SpecError::FaultProbability(fault_probability));
        }

        Ok(Self {
            identifier,
            faces,
            fault_probability,
        })
    }

    /// Validate a decoded document under the given identifier.
    pub fn from_document(identifier: impl Into<String>, doc: SpecificationDocument) -> Result<Self, SpecError> {
        let mut faces = Vec::with_capacity(doc.faces.len());
        for (index, value) in doc.faces.into_iter().enumerate() {
            match u32::try_from(value) {
                Ok(face) if face > 0 => faces.push(face),
                _ => return Err(SpecError::NonPositiveFace { index, value }),
            }
        }
        Self::new(identifier, faces, doc.fault_probability)
    }

    pub fn to_document(&self) -> SpecificationDocument {
        SpecificationDocument {
            faces: self.faces.iter().map(|&f| i64::from(f)).collect(),
            fault_probability: self.fault_probability,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    pub fn fault_probability(&self) -> f64 {
        self.fault_probability
    }
}

/// Identifiers are 1..=64 characters of `[A-Za-z0-9_-]`.
pub fn validate_identifier(identifier: &str) -> Result<(), SpecError> {
    let valid = !identifier.is_empty()
        && identifier.len() <= MAX_IDENTIFIER_LEN
        && identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

    if valid {
        Ok(())
    } else {
        Err(SpecError::Identifier(identifier.to_string()))
    }
}

/// Returns true if `count` is an accepted batch size.
pub fn is_valid_batch_size(count: usize) -> bool {
    (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&count)
}

/// Aggregated outcome of a successful batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRoll {
    /// Values in trial index order.
    pub rolls: Vec<u32>,
    pub total: u64,
}

impl BatchRoll {
    pub fn new(rolls: Vec<u32>) -> Self {
        let total = rolls.iter().map(|&v| u64::from(v)).sum();
        Self { rolls, total }
    }

    pub fn count(&self) -> usize {
        self.rolls.len()
    }
}
