//! Field accessors.

use crate::error::{CoreError, CoreResult};
use entiflush_value::{Value, ValueKind, ValueResult};
use std::fmt;
use std::sync::Arc;

/// Reads a field of `T` as a [`Value`].
pub type Getter<T> = fn(&T) -> Value;

/// Writes a [`Value`] into a field of `T`.
pub type Setter<T> = fn(&mut T, Value) -> ValueResult<()>;

/// A `(get, set)` pair addressing one field of an entity type.
///
/// Accessors are declared once per field when the entity's schema is built
/// and are immutable afterwards. They hold plain function pointers, so they
/// are cheap to clone and can be shared across batches and threads.
///
/// # Example
///
/// ```rust
/// use entiflush_core::Accessor;
/// use entiflush_value::{Value, ValueKind};
///
/// struct Category {
///     id: i64,
/// }
///
/// let id = Accessor::new("id", ValueKind::Integer, |c: &Category| c.id.into())
///     .with_setter(|c, v| {
///         c.id = v.try_into()?;
///         Ok(())
///     });
///
/// let mut category = Category { id: -1 };
/// id.set(&mut category, Value::Integer(10)).unwrap();
/// assert_eq!(id.get(&category), Value::Integer(10));
/// ```
pub struct Accessor<T> {
    name: Arc<str>,
    kind: ValueKind,
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

impl<T> Accessor<T> {
    /// Creates a read-only accessor.
    pub fn new(name: &str, kind: ValueKind, getter: Getter<T>) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            getter,
            setter: None,
        }
    }

    /// Adds a setter, making the field writable by the engine.
    #[must_use]
    pub fn with_setter(mut self, setter: Setter<T>) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field's declared kind.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Returns true if the field has a setter.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub(crate) fn getter(&self) -> Getter<T> {
        self.getter
    }

    /// Reads the field.
    #[inline]
    pub fn get(&self, entity: &T) -> Value {
        (self.getter)(entity)
    }

    /// Writes the field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReadOnlyField`] if the accessor has no setter, or
    /// [`CoreError::FieldAssignment`] if the value does not fit the field.
    pub fn set(&self, entity: &mut T, value: Value) -> CoreResult<()> {
        let setter = self
            .setter
            .ok_or_else(|| CoreError::read_only_field(std::any::type_name::<T>(), self.name()))?;
        setter(entity, value).map_err(|source| CoreError::FieldAssignment {
            field: self.name.to_string(),
            source,
        })
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            kind: self.kind,
            getter: self.getter,
            setter: self.setter,
        }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("writable", &self.is_writable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        id: i64,
        label: Option<String>,
    }

    fn id() -> Accessor<Row> {
        Accessor::new("id", ValueKind::Integer, |r: &Row| r.id.into()).with_setter(|r, v| {
            r.id = v.try_into()?;
            Ok(())
        })
    }

    #[test]
    fn get_and_set() {
        let accessor = id();
        let mut row = Row { id: 1, label: None };
        accessor.set(&mut row, Value::Integer(5)).unwrap();
        assert_eq!(accessor.get(&row), Value::Integer(5));
    }

    #[test]
    fn read_only_rejects_set() {
        let label = Accessor::new("label", ValueKind::Text, |r: &Row| r.label.clone().into());
        let mut row = Row { id: 1, label: None };
        let err = label.set(&mut row, Value::from("x")).unwrap_err();
        assert!(matches!(err, CoreError::ReadOnlyField { .. }));
        assert_eq!(label.get(&row), Value::Null);
    }

    #[test]
    fn wrong_kind_is_assignment_error() {
        let mut row = Row { id: 1, label: None };
        let err = id().set(&mut row, Value::from("ten")).unwrap_err();
        assert!(matches!(err, CoreError::FieldAssignment { .. }));
        assert_eq!(row.id, 1);
    }

    #[test]
    fn clone_shares_name() {
        let a = id();
        let b = a.clone();
        assert_eq!(a.name(), b.name());
        assert!(b.is_writable());
    }
}
