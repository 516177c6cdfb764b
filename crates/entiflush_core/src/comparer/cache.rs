//! Shared cache of compiled comparers.

use crate::comparer::StructuralComparer;
use crate::error::CoreResult;
use crate::schema::{Accessor, EntitySchema};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use tracing::debug;

type CacheKey = (TypeId, Vec<String>);

/// Caches one [`StructuralComparer`] per (entity type, selector names).
///
/// Lookups take a read lock only long enough to clone the comparer handle;
/// comparisons never touch the lock. When two threads build the same
/// comparer concurrently, the first one inserted wins and the other copy is
/// discarded.
///
/// Comparers are keyed by selector *names*: two selector lists with the same
/// names for the same type are assumed to read the same fields.
#[derive(Debug, Default)]
pub struct ComparerCache {
    comparers: RwLock<HashMap<CacheKey, StructuralComparer>>,
}

impl ComparerCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the comparer for `selectors`, compiling it on first use.
    pub fn get_or_build<T: 'static>(&self, selectors: &[Accessor<T>]) -> StructuralComparer {
        let key: CacheKey = (
            TypeId::of::<T>(),
            selectors.iter().map(|s| s.name().to_string()).collect(),
        );
        if let Some(comparer) = self.comparers.read().get(&key) {
            return comparer.clone();
        }

        let built = StructuralComparer::build(selectors);
        let mut comparers = self.comparers.write();
        let len = comparers.len();
        let winner = comparers.entry(key).or_insert(built).clone();
        if comparers.len() > len {
            debug!(
                entity = winner.type_name(),
                fields = winner.fields().len(),
                "compiled structural comparer"
            );
        }
        winner
    }

    /// Returns the comparer for named fields of a schema.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::UnknownField`] if a name is not a field.
    pub fn get_or_build_for<T: 'static>(
        &self,
        schema: &EntitySchema<T>,
        names: &[&str],
    ) -> CoreResult<StructuralComparer> {
        let selectors = names
            .iter()
            .map(|name| schema.field(name).cloned())
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(self.get_or_build(&selectors))
    }

    /// Returns the comparer over a schema's primary key.
    pub fn primary_key<T: 'static>(&self, schema: &EntitySchema<T>) -> StructuralComparer {
        self.get_or_build(schema.primary_key())
    }

    /// Returns the number of cached comparers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.comparers.read().len()
    }

    /// Returns true if nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
