//! Error types for the value crate.

use crate::ValueKind;
use thiserror::Error;

/// Result type for value operations.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur when converting values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The value does not have the kind the caller asked for.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Kind the caller expected.
        expected: ValueKind,
        /// Kind actually found.
        actual: ValueKind,
    },

    /// The value could not be converted to the requested kind.
    #[error("cannot convert {value} to {target}")]
    Conversion {
        /// Rendering of the source value.
        value: String,
        /// Kind the conversion targeted.
        target: ValueKind,
    },

    /// An integer did not fit the requested width.
    #[error("integer {0} out of range")]
    OutOfRange(i64),
}

impl ValueError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: ValueKind, actual: ValueKind) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// Creates a conversion error.
    pub fn conversion(value: impl ToString, target: ValueKind) -> Self {
        Self::Conversion {
            value: value.to_string(),
            target,
        }
    }
}
