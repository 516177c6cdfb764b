//! Error types for the entiflush engine.

use entiflush_backend::BackendError;
use entiflush_value::{Value, ValueError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while staging or flushing entity batches.
///
/// Every error propagates to the caller. The engine never skips a row or
/// retries a write, since a partial fix-up would corrupt identity
/// propagation for dependent rows.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A structural comparer received a reference of another type.
    #[error("type mismatch: comparer is compiled for {expected}")]
    TypeMismatch {
        /// Type the comparer was compiled for.
        expected: &'static str,
    },

    /// An update names no writable field once key fields are removed.
    #[error("update of {table} changes no non-key field")]
    EmptyUpdateSet {
        /// Table of the entity.
        table: String,
    },

    /// The backend reported a failure while writing.
    #[error("backend error on {table}: {source}")]
    Backend {
        /// Table being written.
        table: String,
        /// The backend's native diagnostic.
        #[source]
        source: BackendError,
    },

    /// A self-referencing key cannot be satisfied by any ordering.
    #[error("unresolvable self reference in {table}: {key} references {parent}")]
    UnresolvableSelfReference {
        /// Table of the entity.
        table: String,
        /// Key of the entity that cannot be placed.
        key: Value,
        /// Parent key it references.
        parent: Value,
    },

    /// A field name does not exist on the entity type.
    #[error("unknown field {field} on {entity}")]
    UnknownField {
        /// Entity type or table name.
        entity: String,
        /// The missing field.
        field: String,
    },

    /// A schema declares no primary key.
    #[error("{table} declares no primary key")]
    MissingPrimaryKey {
        /// Table of the schema.
        table: String,
    },

    /// The engine needs to write a field that has no setter.
    #[error("field {field} on {table} is read-only")]
    ReadOnlyField {
        /// Table of the entity.
        table: String,
        /// The read-only field.
        field: String,
    },

    /// A value could not be assigned to a field.
    #[error("cannot assign field {field}: {source}")]
    FieldAssignment {
        /// Field being assigned.
        field: String,
        /// Conversion failure.
        #[source]
        source: ValueError,
    },

    /// A generated identity cannot be converted to the key's declared kind.
    #[error("generated identity for {table}.{field} has the wrong type: {source}")]
    IdentityConversion {
        /// Table of the entity.
        table: String,
        /// Generated key field.
        field: String,
        /// Conversion failure.
        #[source]
        source: ValueError,
    },

    /// The same placeholder key was mapped twice.
    #[error("placeholder key {key} in {table} was assigned more than one identity")]
    DuplicateIdentity {
        /// Table of the entity.
        table: String,
        /// The placeholder key.
        key: Value,
    },

    /// A write that must affect a row affected none.
    #[error("row not found in {table}: {key}")]
    RowNotFound {
        /// Table being written.
        table: String,
        /// Rendering of the key columns.
        key: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a backend error for `table`.
    pub fn backend(table: impl Into<String>, source: BackendError) -> Self {
        Self::Backend {
            table: table.into(),
            source,
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates a read-only field error.
    pub fn read_only_field(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ReadOnlyField {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Creates an empty update set error.
    pub fn empty_update_set(table: impl Into<String>) -> Self {
        Self::EmptyUpdateSet {
            table: table.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for failures reported by the backend.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}
