//! Typed view over a compiled comparer.

use crate::comparer::structural::CompiledShape;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A strongly-typed comparer borrowed from a
/// [`super::StructuralComparer`].
///
/// The adapter is a single reference to the already compiled functions:
/// obtaining one does not recompile or allocate, and the type was checked
/// once when it was created.
pub struct TypedComparer<'c, T> {
    shape: &'c CompiledShape<T>,
}

impl<'c, T> TypedComparer<'c, T> {
    pub(crate) fn new(shape: &'c CompiledShape<T>) -> Self {
        Self { shape }
    }

    /// Compares two entities by the selected fields.
    #[inline]
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.shape.compare(a, b)
    }

    /// Returns true if the entities compare equal.
    #[inline]
    pub fn equals(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Hashes the selected fields.
    #[inline]
    pub fn hash(&self, entity: &T) -> u64 {
        self.shape.hash(entity)
    }

    /// Sorts a slice by the selected fields. The sort is stable.
    pub fn sort(&self, entities: &mut [T]) {
        entities.sort_by(|a, b| self.compare(a, b));
    }

    /// Removes consecutive entities that compare equal, keeping the first.
    ///
    /// Sort first to remove every duplicate.
    pub fn dedup(&self, entities: &mut Vec<T>) {
        entities.dedup_by(|a, b| self.equals(a, b));
    }

    /// Wraps an entity so it can be used as a key in std maps and sets.
    pub fn key<'e>(&self, entity: &'e T) -> KeyRef<'c, 'e, T> {
        KeyRef {
            comparer: *self,
            entity,
        }
    }
}

impl<T> Clone for TypedComparer<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedComparer<'_, T> {}

impl<T> fmt::Debug for TypedComparer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedComparer")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// An entity reference whose `Eq`, `Ord` and `Hash` follow a comparer.
pub struct KeyRef<'c, 'e, T> {
    comparer: TypedComparer<'c, T>,
    entity: &'e T,
}

impl<'e, T> KeyRef<'_, 'e, T> {
    /// Returns the wrapped entity.
    #[must_use]
    pub fn entity(&self) -> &'e T {
        self.entity
    }
}

impl<T> PartialEq for KeyRef<'_, '_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.comparer.equals(self.entity, other.entity)
    }
}

impl<T> Eq for KeyRef<'_, '_, T> {}

impl<T> PartialOrd for KeyRef<'_, '_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for KeyRef<'_, '_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparer.compare(self.entity, other.entity)
    }
}

impl<T> Hash for KeyRef<'_, '_, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.comparer.hash(self.entity));
    }
}

impl<T: fmt::Debug> fmt::Debug for KeyRef<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyRef").field(self.entity).finish()
    }
}
