//! Error types for backend operations.

use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors reported by a backend connection.
///
/// These are the backend's native diagnostics. The engine wraps them without
/// interpretation and never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The table is not known to the backend.
    #[error("unknown table: {table}")]
    UnknownTable {
        /// Name of the table.
        table: String,
    },

    /// A row is missing a column the backend needs.
    #[error("missing column {column} for table {table}")]
    MissingColumn {
        /// Name of the table.
        table: String,
        /// Name of the column.
        column: String,
    },

    /// A row with the same primary key already exists.
    #[error("duplicate key {key} in table {table}")]
    DuplicateKey {
        /// Name of the table.
        table: String,
        /// Rendering of the key.
        key: String,
    },

    /// A write would break a foreign-key constraint.
    #[error("foreign key violation on {table}.{column} = {value} (references {referenced_table})")]
    ForeignKeyViolation {
        /// Table holding the foreign key.
        table: String,
        /// Foreign-key column.
        column: String,
        /// Rendering of the offending value.
        value: String,
        /// Table the foreign key points at.
        referenced_table: String,
    },

    /// The backend rejected the statement.
    #[error("statement rejected on {table}: {message}")]
    Rejected {
        /// Name of the table.
        table: String,
        /// Native diagnostic.
        message: String,
    },

    /// A row could not be encoded or decoded.
    #[error("row codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },
}

impl BackendError {
    /// Creates an unknown table error.
    pub fn unknown_table(table: impl Into<String>) -> Self {
        Self::UnknownTable {
            table: table.into(),
        }
    }

    /// Creates a rejected statement error.
    pub fn rejected(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}
