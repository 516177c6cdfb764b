//! Placeholder-to-generated key mapping.

use crate::error::{CoreError, CoreResult};
use entiflush_value::Value;
use std::collections::hash_map::{self, HashMap};

/// Maps placeholder keys to the identities the backend generated for them.
///
/// A batch fills its map as it writes rows with a generated key. The map is
/// then handed to dependent batches so their foreign keys can be rewritten
/// from placeholders to real keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    identities: HashMap<Value, Value>,
}

impl IdentityMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `old` to `new`, returning the previous mapping of `old`.
    pub fn insert(&mut self, old: Value, new: Value) -> Option<Value> {
        self.identities.insert(old, new)
    }

    /// Records a generated identity, refusing to remap a placeholder.
    pub(crate) fn record(&mut self, table: &str, old: Value, new: Value) -> CoreResult<()> {
        match self.identities.entry(old) {
            hash_map::Entry::Occupied(entry) => Err(CoreError::DuplicateIdentity {
                table: table.to_string(),
                key: entry.key().clone(),
            }),
            hash_map::Entry::Vacant(entry) => {
                entry.insert(new);
                Ok(())
            }
        }
    }

    /// Returns the identity generated for a placeholder.
    #[must_use]
    pub fn resolve(&self, old: &Value) -> Option<&Value> {
        self.identities.get(old)
    }

    /// Returns true if `value` is one of the generated identities.
    #[must_use]
    pub fn contains_identity(&self, value: &Value) -> bool {
        self.identities.values().any(|new| new == value)
    }

    /// Iterates over `(placeholder, identity)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.identities.iter()
    }

    /// Returns the number of mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Returns true if nothing has been mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Removes every mapping.
    pub fn clear(&mut self) {
        self.identities.clear();
    }
}

impl FromIterator<(Value, Value)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self {
            identities: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a IdentityMap {
    type Item = (&'a Value, &'a Value);
    type IntoIter = hash_map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.identities.iter()
    }
}
