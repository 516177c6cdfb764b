//! In-memory backend for testing.

use crate::backend::Backend;
use crate::codec::{decode_row, encode_row};
use crate::error::{BackendError, BackendResult};
use crate::row::Row;
use entiflush_value::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Kind of write, used to target injected faults and classify calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `insert` or `insert_with_identity`.
    Insert,
    /// `delete`.
    Delete,
    /// `update`.
    Update,
}

/// A successful call recorded by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// A plain insert.
    Insert {
        /// Target table.
        table: String,
        /// Row as received.
        row: Row,
    },
    /// An insert with a generated identity.
    InsertWithIdentity {
        /// Target table.
        table: String,
        /// Row as received (placeholder identity included).
        row: Row,
        /// Identity the backend generated.
        identity: Value,
    },
    /// A delete by key.
    Delete {
        /// Target table.
        table: String,
        /// Key columns.
        key: Row,
        /// Rows affected.
        affected: u64,
    },
    /// An update by key.
    Update {
        /// Target table.
        table: String,
        /// Key columns.
        key: Row,
        /// Columns written.
        set: Row,
        /// Rows affected.
        affected: u64,
    },
}

impl BackendCall {
    /// Returns the table the call targeted.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            BackendCall::Insert { table, .. }
            | BackendCall::InsertWithIdentity { table, .. }
            | BackendCall::Delete { table, .. }
            | BackendCall::Update { table, .. } => table,
        }
    }

    /// Returns the kind of write.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            BackendCall::Insert { .. } | BackendCall::InsertWithIdentity { .. } => {
                Operation::Insert
            }
            BackendCall::Delete { .. } => Operation::Delete,
            BackendCall::Update { .. } => Operation::Update,
        }
    }
}

#[derive(Debug)]
struct Identity {
    column: String,
    next: i64,
}

#[derive(Debug)]
struct MemoryTable {
    key_columns: Vec<String>,
    identity: Option<Identity>,
    /// Primary-key values -> CBOR row payload.
    rows: BTreeMap<Vec<Value>, Vec<u8>>,
}

impl MemoryTable {
    fn key_of(&self, table: &str, row: &Row) -> BackendResult<Vec<Value>> {
        self.key_columns
            .iter()
            .map(|column| {
                row.get(column)
                    .cloned()
                    .ok_or_else(|| BackendError::MissingColumn {
                        table: table.to_string(),
                        column: column.clone(),
                    })
            })
            .collect()
    }

    /// Checks whether any row (other than `skip`) holds `value` in `column`.
    fn column_contains(
        &self,
        column: &str,
        value: &Value,
        skip: Option<&[Value]>,
    ) -> BackendResult<bool> {
        if skip.is_none() && self.key_columns.len() == 1 && self.key_columns[0] == column {
            return Ok(self.rows.contains_key(std::slice::from_ref(value)));
        }

        for (key, payload) in &self.rows {
            if skip == Some(key.as_slice()) {
                continue;
            }
            if decode_row(payload)?.get(column) == Some(value) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Debug, Clone)]
struct ForeignKey {
    table: String,
    column: String,
    parent_table: String,
    parent_column: String,
}

#[derive(Debug)]
struct Fault {
    table: String,
    operation: Operation,
    nth: usize,
    seen: usize,
}

/// An in-memory backend.
///
/// Tables are declared up front with their primary-key columns. Rows are
/// stored as encoded payloads keyed by their primary-key values. The
/// backend is suitable for:
/// - Unit and integration tests of write ordering
/// - Verifying identity propagation against generated keys
/// - Simulating backend failures
///
/// Foreign keys declared with [`MemoryBackend::with_foreign_key`] are
/// enforced immediately on every write, the way a database without deferred
/// constraints would, so a wrongly ordered batch fails.
///
/// # Example
///
/// ```rust
/// use entiflush_backend::{Backend, MemoryBackend, Row};
/// use entiflush_value::Value;
///
/// let mut backend = MemoryBackend::new().with_identity_table("categories", "id", 10);
/// let id = backend
///     .insert_with_identity("categories", &Row::new().with("id", -1i64), "id")
///     .unwrap();
/// assert_eq!(id, Value::Integer(10));
/// assert_eq!(backend.rows("categories").unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, MemoryTable>>,
    foreign_keys: Vec<ForeignKey>,
    faults: Vec<Fault>,
    journal: RwLock<Vec<BackendCall>>,
}

impl MemoryBackend {
    /// Creates a new backend with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a table whose keys are assigned by the caller.
    #[must_use]
    pub fn with_table(self, name: &str, key_columns: &[&str]) -> Self {
        self.tables.write().insert(
            name.to_string(),
            MemoryTable {
                key_columns: key_columns.iter().map(|c| (*c).to_string()).collect(),
                identity: None,
                rows: BTreeMap::new(),
            },
        );
        self
    }

    /// Declares a table whose single key column is generated by the backend,
    /// starting at `first`.
    #[must_use]
    pub fn with_identity_table(self, name: &str, identity_column: &str, first: i64) -> Self {
        self.tables.write().insert(
            name.to_string(),
            MemoryTable {
                key_columns: vec![identity_column.to_string()],
                identity: Some(Identity {
                    column: identity_column.to_string(),
                    next: first,
                }),
                rows: BTreeMap::new(),
            },
        );
        self
    }

    /// Declares a foreign key `table.column -> parent_table.parent_column`.
    #[must_use]
    pub fn with_foreign_key(
        mut self,
        table: &str,
        column: &str,
        parent_table: &str,
        parent_column: &str,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            table: table.to_string(),
            column: column.to_string(),
            parent_table: parent_table.to_string(),
            parent_column: parent_column.to_string(),
        });
        self
    }

    /// Makes the `nth` (1-based) `operation` call on `table` fail with
    /// [`BackendError::Rejected`].
    #[must_use]
    pub fn fail_on(mut self, table: &str, operation: Operation, nth: usize) -> Self {
        self.faults.push(Fault {
            table: table.to_string(),
            operation,
            nth,
            seen: 0,
        });
        self
    }

    /// Returns the decoded rows of a table in primary-key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is unknown or a payload is corrupt.
    pub fn rows(&self, table: &str) -> BackendResult<Vec<Row>> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| BackendError::unknown_table(table))?;
        t.rows.values().map(|payload| decode_row(payload)).collect()
    }

    /// Returns the row with the given primary-key values.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is unknown or the payload is corrupt.
    pub fn row(&self, table: &str, key: &[Value]) -> BackendResult<Option<Row>> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| BackendError::unknown_table(table))?;
        t.rows.get(key).map(|payload| decode_row(payload)).transpose()
    }

    /// Returns every successful call, in the order it was issued.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.journal.read().clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&mut self) {
        self.journal.write().clear();
    }

    fn check_fault(&mut self, table: &str, operation: Operation) -> BackendResult<()> {
        for fault in &mut self.faults {
            if fault.table == table && fault.operation == operation {
                fault.seen += 1;
                if fault.seen == fault.nth {
                    return Err(BackendError::rejected(
                        table,
                        format!("injected failure on {operation:?} #{}", fault.nth),
                    ));
                }
            }
        }
        Ok(())
    }

    fn record(&self, call: BackendCall) {
        self.journal.write().push(call);
    }
}

fn render_key(key: &[Value]) -> String {
    key.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks that every non-null foreign key in `row` points at an existing row.
fn check_parent_refs(
    tables: &HashMap<String, MemoryTable>,
    foreign_keys: &[ForeignKey],
    table: &str,
    row: &Row,
) -> BackendResult<()> {
    for fk in foreign_keys.iter().filter(|fk| fk.table == table) {
        let value = match row.get(&fk.column) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };
        let parent = tables
            .get(&fk.parent_table)
            .ok_or_else(|| BackendError::unknown_table(&fk.parent_table))?;
        if !parent.column_contains(&fk.parent_column, value, None)? {
            return Err(BackendError::ForeignKeyViolation {
                table: table.to_string(),
                column: fk.column.clone(),
                value: value.to_string(),
                referenced_table: fk.parent_table.clone(),
            });
        }
    }
    Ok(())
}

/// Checks that no row references `stored`, which is about to be deleted.
fn check_child_refs(
    tables: &HashMap<String, MemoryTable>,
    foreign_keys: &[ForeignKey],
    table: &str,
    stored: &Row,
    key: &[Value],
) -> BackendResult<()> {
    for fk in foreign_keys.iter().filter(|fk| fk.parent_table == table) {
        let value = match stored.get(&fk.parent_column) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };
        let child = tables
            .get(&fk.table)
            .ok_or_else(|| BackendError::unknown_table(&fk.table))?;
        let skip = (fk.table == table).then_some(key);
        if child.column_contains(&fk.column, value, skip)? {
            return Err(BackendError::ForeignKeyViolation {
                table: fk.table.clone(),
                column: fk.column.clone(),
                value: value.to_string(),
                referenced_table: table.to_string(),
            });
        }
    }
    Ok(())
}

fn store(
    tables: &mut HashMap<String, MemoryTable>,
    foreign_keys: &[ForeignKey],
    table: &str,
    row: &Row,
) -> BackendResult<()> {
    check_parent_refs(tables, foreign_keys, table, row)?;
    let t = tables
        .get_mut(table)
        .ok_or_else(|| BackendError::unknown_table(table))?;
    let key = t.key_of(table, row)?;
    if t.rows.contains_key(&key) {
        return Err(BackendError::DuplicateKey {
            table: table.to_string(),
            key: render_key(&key),
        });
    }
    let payload = encode_row(row)?;
    t.rows.insert(key, payload);
    Ok(())
}

impl Backend for MemoryBackend {
    fn insert(&mut self, table: &str, row: &Row) -> BackendResult<()> {
        self.check_fault(table, Operation::Insert)?;
        trace!(table, row = %row, "insert");

        store(&mut self.tables.write(), &self.foreign_keys, table, row)?;
        self.record(BackendCall::Insert {
            table: table.to_string(),
            row: row.clone(),
        });
        Ok(())
    }

    fn insert_with_identity(
        &mut self,
        table: &str,
        row: &Row,
        identity_column: &str,
    ) -> BackendResult<Value> {
        self.check_fault(table, Operation::Insert)?;

        let mut tables = self.tables.write();
        let generated = {
            let t = tables
                .get_mut(table)
                .ok_or_else(|| BackendError::unknown_table(table))?;
            let identity = t
                .identity
                .as_mut()
                .filter(|identity| identity.column == identity_column)
                .ok_or_else(|| {
                    BackendError::rejected(
                        table,
                        format!("{identity_column} is not an identity column"),
                    )
                })?;
            let next = identity.next;
            identity.next += 1;
            Value::Integer(next)
        };
        trace!(table, row = %row, identity = %generated, "insert with identity");

        let mut stored = row.clone();
        stored.set(identity_column, generated.clone());
        store(&mut tables, &self.foreign_keys, table, &stored)?;
        drop(tables);

        self.record(BackendCall::InsertWithIdentity {
            table: table.to_string(),
            row: row.clone(),
            identity: generated.clone(),
        });
        Ok(generated)
    }

    fn delete(&mut self, table: &str, key: &Row) -> BackendResult<u64> {
        self.check_fault(table, Operation::Delete)?;
        trace!(table, key = %key, "delete");

        let mut tables = self.tables.write();
        let found = {
            let t = tables
                .get(table)
                .ok_or_else(|| BackendError::unknown_table(table))?;
            let key_values = t.key_of(table, key)?;
            match t.rows.get(&key_values) {
                Some(payload) => Some((decode_row(payload)?, key_values)),
                None => None,
            }
        };

        let affected = match found {
            Some((stored, key_values)) => {
                check_child_refs(&tables, &self.foreign_keys, table, &stored, &key_values)?;
                if let Some(t) = tables.get_mut(table) {
                    t.rows.remove(&key_values);
                }
                1
            }
            None => 0,
        };
        drop(tables);

        self.record(BackendCall::Delete {
            table: table.to_string(),
            key: key.clone(),
            affected,
        });
        Ok(affected)
    }

    fn update(&mut self, table: &str, key: &Row, set: &Row) -> BackendResult<u64> {
        self.check_fault(table, Operation::Update)?;
        trace!(table, key = %key, set = %set, "update");

        let mut tables = self.tables.write();
        let found = {
            let t = tables
                .get(table)
                .ok_or_else(|| BackendError::unknown_table(table))?;
            let key_values = t.key_of(table, key)?;
            match t.rows.get(&key_values) {
                Some(payload) => Some((decode_row(payload)?, key_values)),
                None => None,
            }
        };

        let affected = match found {
            Some((mut stored, key_values)) => {
                for (column, value) in set.iter() {
                    stored.set(column, value.clone());
                }
                check_parent_refs(&tables, &self.foreign_keys, table, &stored)?;
                let payload = encode_row(&stored)?;
                let t = tables
                    .get_mut(table)
                    .ok_or_else(|| BackendError::unknown_table(table))?;
                let new_key = t.key_of(table, &stored)?;
                if new_key != key_values && t.rows.contains_key(&new_key) {
                    return Err(BackendError::DuplicateKey {
                        table: table.to_string(),
                        key: render_key(&new_key),
                    });
                }
                t.rows.remove(&key_values);
                t.rows.insert(new_key, payload);
                1
            }
            None => 0,
        };
        drop(tables);

        self.record(BackendCall::Update {
            table: table.to_string(),
            key: key.clone(),
            set: set.clone(),
            affected,
        });
        Ok(affected)
    }
}
