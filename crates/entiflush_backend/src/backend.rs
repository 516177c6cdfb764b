//! Backend connection trait definition.

use crate::error::BackendResult;
use crate::row::Row;
use entiflush_value::Value;

/// A connection to the storage backend that executes row writes.
///
/// The engine performs no SQL or DDL itself. It sequences calls to this
/// trait; statement generation, parameter binding and transactions belong
/// to the implementor and the caller.
///
/// # Invariants
///
/// - Calls run to completion on the calling thread
/// - A failed call leaves the connection usable, but the engine stops
///   issuing further writes for the list that failed
/// - Commit and rollback are the caller's responsibility
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing
pub trait Backend: Send {
    /// Inserts a row whose key was assigned by the caller.
    ///
    /// # Errors
    ///
    /// Returns the backend's diagnostic if the insert fails.
    fn insert(&mut self, table: &str, row: &Row) -> BackendResult<()>;

    /// Inserts a row whose `identity_column` is generated by the backend.
    ///
    /// The value of `identity_column` in `row` is a placeholder and is
    /// ignored. Returns the generated identity, in whatever kind the
    /// backend natively produces.
    ///
    /// # Errors
    ///
    /// Returns the backend's diagnostic if the insert fails.
    fn insert_with_identity(
        &mut self,
        table: &str,
        row: &Row,
        identity_column: &str,
    ) -> BackendResult<Value>;

    /// Deletes the row identified by the primary-key columns in `key`.
    ///
    /// Returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns the backend's diagnostic if the delete fails.
    fn delete(&mut self, table: &str, key: &Row) -> BackendResult<u64>;

    /// Updates the columns in `set` on the row identified by `key`.
    ///
    /// Returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns the backend's diagnostic if the update fails.
    fn update(&mut self, table: &str, key: &Row, set: &Row) -> BackendResult<u64>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn insert(&mut self, table: &str, row: &Row) -> BackendResult<()> {
        (**self).insert(table, row)
    }

    fn insert_with_identity(
        &mut self,
        table: &str,
        row: &Row,
        identity_column: &str,
    ) -> BackendResult<Value> {
        (**self).insert_with_identity(table, row, identity_column)
    }

    fn delete(&mut self, table: &str, key: &Row) -> BackendResult<u64> {
        (**self).delete(table, key)
    }

    fn update(&mut self, table: &str, key: &Row, set: &Row) -> BackendResult<u64> {
        (**self).update(table, key, set)
    }
}
