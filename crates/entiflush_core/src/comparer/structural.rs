//! Structural comparer over type-erased entity references.

use crate::comparer::TypedComparer;
use crate::error::{CoreError, CoreResult};
use crate::schema::{Accessor, EntitySchema, Getter};
use entiflush_value::Value;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Folds one field hash into the running hash.
///
/// Order-sensitive: swapping two fields changes the result.
#[inline]
pub(crate) fn fold_hash(hash: u64, field_hash: u64) -> u64 {
    (hash << 5).wrapping_add(hash) ^ field_hash
}

#[inline]
fn hash_value(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// One selected field: compares and hashes a single member of `T`.
pub(crate) struct FieldComparer<T> {
    name: Arc<str>,
    getter: Getter<T>,
}

impl<T> FieldComparer<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.getter)(a).cmp(&(self.getter)(b))
    }

    fn hash(&self, entity: &T) -> u64 {
        hash_value(&(self.getter)(entity))
    }
}

/// The compiled comparison for one entity type and selector list.
pub(crate) struct CompiledShape<T> {
    fields: Vec<FieldComparer<T>>,
}

impl<T> CompiledShape<T> {
    pub(crate) fn compare(&self, a: &T, b: &T) -> Ordering {
        for field in &self.fields {
            match field.compare(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    pub(crate) fn hash(&self, entity: &T) -> u64 {
        self.fields
            .iter()
            .fold(0, |hash, field| fold_hash(hash, field.hash(entity)))
    }
}

/// Object-safe face of a [`CompiledShape`], so a comparer can be held
/// without naming the entity type.
trait KeyShape: Send + Sync {
    fn compare_erased(&self, a: &dyn Any, b: &dyn Any) -> Option<Ordering>;
    fn hash_erased(&self, entity: &dyn Any) -> Option<u64>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> KeyShape for CompiledShape<T> {
    fn compare_erased(&self, a: &dyn Any, b: &dyn Any) -> Option<Ordering> {
        let (a, b) = (a.downcast_ref::<T>()?, b.downcast_ref::<T>()?);
        Some(self.compare(a, b))
    }

    fn hash_erased(&self, entity: &dyn Any) -> Option<u64> {
        entity.downcast_ref::<T>().map(|entity| self.hash(entity))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Total ordering, equality and hashing over entity references, compiled
/// once from an ordered list of field selectors.
///
/// Comparison is lexicographic: the first selector that differs decides.
/// A missing reference (`None`) sorts before any entity. Field values use
/// their natural order, where null sorts before any non-null value.
///
/// Equal hashes do not imply equality; [`StructuralComparer::equals`] is
/// the source of truth. Hashes are stable for the lifetime of the process
/// only.
///
/// The comparer holds no mutable state and can be shared freely across
/// threads. Use [`StructuralComparer::typed`] to get a zero-cost typed view.
///
/// # Example
///
/// ```rust
/// use entiflush_core::{Accessor, StructuralComparer};
/// use entiflush_value::ValueKind;
/// use std::cmp::Ordering;
///
/// struct Line {
///     order_id: i64,
///     line_no: i64,
/// }
///
/// let comparer = StructuralComparer::build(&[
///     Accessor::new("order_id", ValueKind::Integer, |l: &Line| l.order_id.into()),
///     Accessor::new("line_no", ValueKind::Integer, |l: &Line| l.line_no.into()),
/// ]);
///
/// let a = Line { order_id: 1, line_no: 2 };
/// let b = Line { order_id: 1, line_no: 3 };
/// assert_eq!(comparer.compare(Some(&a), Some(&b)).unwrap(), Ordering::Less);
/// assert!(comparer.compare(Some(&a), Some(&"not a line")).is_err());
/// ```
#[derive(Clone)]
pub struct StructuralComparer {
    type_id: TypeId,
    type_name: &'static str,
    fields: Arc<[Arc<str>]>,
    shape: Arc<dyn KeyShape>,
}

impl StructuralComparer {
    /// Compiles a comparer for `T` from an ordered list of selectors.
    ///
    /// Selectors earlier in the list take priority.
    pub fn build<T: 'static>(selectors: &[Accessor<T>]) -> Self {
        let fields = selectors
            .iter()
            .map(|selector| FieldComparer {
                name: Arc::from(selector.name()),
                getter: selector.getter(),
            })
            .collect::<Vec<_>>();

        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            fields: fields.iter().map(|field| Arc::clone(&field.name)).collect(),
            shape: Arc::new(CompiledShape { fields }),
        }
    }

    /// Compiles a comparer over named fields of a schema.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if a name is not a field of `T`.
    pub fn for_fields<T: 'static>(schema: &EntitySchema<T>, names: &[&str]) -> CoreResult<Self> {
        let selectors = names
            .iter()
            .map(|name| schema.field(name).cloned())
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self::build(&selectors))
    }

    /// Compiles a comparer over a schema's primary key.
    pub fn for_primary_key<T: 'static>(schema: &EntitySchema<T>) -> Self {
        Self::build(schema.primary_key())
    }

    /// Returns the name of the type the comparer was compiled for.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the selected field names in priority order.
    #[must_use]
    pub fn fields(&self) -> &[Arc<str>] {
        &self.fields
    }

    /// Returns true if the comparer was compiled for `T`.
    #[must_use]
    pub fn accepts<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    fn mismatch(&self) -> CoreError {
        CoreError::TypeMismatch {
            expected: self.type_name,
        }
    }

    fn check(&self, entity: &dyn Any) -> CoreResult<()> {
        if entity.type_id() == self.type_id {
            Ok(())
        } else {
            Err(self.mismatch())
        }
    }

    /// Compares two references.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if a present reference is not of
    /// the compiled type.
    pub fn compare(&self, a: Option<&dyn Any>, b: Option<&dyn Any>) -> CoreResult<Ordering> {
        match (a, b) {
            (None, None) => Ok(Ordering::Equal),
            (None, Some(b)) => self.check(b).map(|()| Ordering::Less),
            (Some(a), None) => self.check(a).map(|()| Ordering::Greater),
            (Some(a), Some(b)) => self
                .shape
                .compare_erased(a, b)
                .ok_or_else(|| self.mismatch()),
        }
    }

    /// Returns true if the references compare equal.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] as for [`StructuralComparer::compare`].
    pub fn equals(&self, a: Option<&dyn Any>, b: Option<&dyn Any>) -> CoreResult<bool> {
        Ok(self.compare(a, b)? == Ordering::Equal)
    }

    /// Hashes the selected fields of a reference.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the reference is not of the
    /// compiled type.
    pub fn hash(&self, entity: &dyn Any) -> CoreResult<u64> {
        self.shape
            .hash_erased(entity)
            .ok_or_else(|| self.mismatch())
    }

    /// Returns a typed view over the same compiled functions.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the comparer was compiled for
    /// another type.
    pub fn typed<T: 'static>(&self) -> CoreResult<TypedComparer<'_, T>> {
        self.shape
            .as_any()
            .downcast_ref::<CompiledShape<T>>()
            .map(TypedComparer::new)
            .ok_or_else(|| self.mismatch())
    }
}

impl fmt::Debug for StructuralComparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralComparer")
            .field("type", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}
