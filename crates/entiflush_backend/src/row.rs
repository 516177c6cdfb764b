//! Column/value rows exchanged with a backend.

use entiflush_value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered list of `(column, value)` pairs.
///
/// Rows are what the engine hands to a backend: a full row for inserts, the
/// primary-key columns for deletes, and key plus changed columns for
/// updates. Column order follows the entity schema's field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty row with room for `capacity` columns.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((column.into(), value.into()));
    }

    /// Builder form of [`Row::push`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Sets a column, replacing its value or appending it.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.columns.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column.to_string(), value)),
        }
    }

    /// Returns the value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns true if the row has the column.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Returns a row holding only the named columns, in the given order.
    ///
    /// Columns the row does not have are skipped.
    #[must_use]
    pub fn project(&self, columns: &[&str]) -> Row {
        columns
            .iter()
            .filter_map(|column| {
                self.get(column)
                    .map(|value| ((*column).to_string(), value.clone()))
            })
            .collect()
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Iterates over column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_existing_column() {
        let mut row = Row::new().with("id", 1i64).with("name", "a");
        row.set("name", Value::from("b"));
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::from("b")));
    }

    #[test]
    fn set_appends_missing_column() {
        let mut row = Row::new().with("id", 1i64);
        row.set("parent_id", Value::Null);
        assert_eq!(row.column_names().collect::<Vec<_>>(), ["id", "parent_id"]);
    }

    #[test]
    fn project_keeps_requested_order() {
        let row = Row::new().with("a", 1i64).with("b", 2i64).with("c", 3i64);
        let projected = row.project(&["c", "a", "missing"]);
        assert_eq!(projected.column_names().collect::<Vec<_>>(), ["c", "a"]);
    }

    #[test]
    fn display() {
        let row = Row::new().with("id", 7i64).with("parent", Value::Null);
        assert_eq!(row.to_string(), "{id: 7, parent: null}");
    }
}
