//! Entity schemas.

use crate::error::{CoreError, CoreResult};
use crate::schema::Accessor;
use entiflush_backend::Row;
use entiflush_value::Value;
use std::collections::HashMap;
use std::fmt;

/// An entity type the engine can persist.
///
/// This is the schema-provider seam: the implementation declares the
/// entity's fields, primary key, optional self reference and optional
/// generated key. The engine asks for the schema once per type through a
/// [`super::SchemaRegistry`] and caches it.
pub trait Entity: Send + Sized + 'static {
    /// Describes the entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if the description is inconsistent (see
    /// [`SchemaBuilder::build`]).
    fn schema() -> CoreResult<EntitySchema<Self>>;
}

/// Describes a field that links an entity to a parent of the same type.
#[derive(Debug, Clone)]
pub struct SelfReference<T> {
    foreign_key: Accessor<T>,
    parent_key: Accessor<T>,
}

impl<T> SelfReference<T> {
    /// The field holding the parent's key.
    #[must_use]
    pub fn foreign_key(&self) -> &Accessor<T> {
        &self.foreign_key
    }

    /// The parent field the foreign key points at.
    #[must_use]
    pub fn parent_key(&self) -> &Accessor<T> {
        &self.parent_key
    }
}

/// Persistence metadata for one entity type.
///
/// Built with [`EntitySchema::builder`]. Field lookups by name are resolved
/// here once; the batch and the write dispatcher only ever hold accessors.
pub struct EntitySchema<T> {
    table: String,
    fields: Vec<Accessor<T>>,
    by_name: HashMap<String, usize>,
    primary_key: Vec<Accessor<T>>,
    self_reference: Option<SelfReference<T>>,
    generated_key: Option<Accessor<T>>,
}

impl<T> EntitySchema<T> {
    /// Starts describing an entity stored in `table`.
    pub fn builder(table: impl Into<String>) -> SchemaBuilder<T> {
        SchemaBuilder {
            table: table.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
            self_reference: None,
            generated_key: None,
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the Rust type name of the entity.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    /// Returns all persisted fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Accessor<T>] {
        &self.fields
    }

    /// Looks up a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if the entity has no such field.
    pub fn field(&self, name: &str) -> CoreResult<&Accessor<T>> {
        self.by_name
            .get(name)
            .map(|&index| &self.fields[index])
            .ok_or_else(|| CoreError::unknown_field(&self.table, name))
    }

    /// Returns the primary-key accessors.
    #[must_use]
    pub fn primary_key(&self) -> &[Accessor<T>] {
        &self.primary_key
    }

    /// Returns true if `name` is part of the primary key.
    #[must_use]
    pub fn is_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|key| key.name() == name)
    }

    /// Returns the self-reference descriptor, if the type is hierarchical.
    #[must_use]
    pub fn self_reference(&self) -> Option<&SelfReference<T>> {
        self.self_reference.as_ref()
    }

    /// Returns the backend-generated key field, if any.
    #[must_use]
    pub fn generated_key(&self) -> Option<&Accessor<T>> {
        self.generated_key.as_ref()
    }

    /// Reads every field of `entity` into a row.
    pub fn row(&self, entity: &T) -> Row {
        self.fields
            .iter()
            .map(|field| (field.name().to_string(), field.get(entity)))
            .collect()
    }

    /// Reads the primary-key fields of `entity` into a row.
    pub fn key_row(&self, entity: &T) -> Row {
        self.primary_key
            .iter()
            .map(|field| (field.name().to_string(), field.get(entity)))
            .collect()
    }

    /// Reads the primary-key values of `entity`.
    pub fn key_values(&self, entity: &T) -> Vec<Value> {
        self.primary_key.iter().map(|field| field.get(entity)).collect()
    }
}

impl<T> fmt::Debug for EntitySchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("table", &self.table)
            .field("fields", &self.fields.len())
            .field(
                "primary_key",
                &self
                    .primary_key
                    .iter()
                    .map(Accessor::name)
                    .collect::<Vec<_>>(),
            )
            .field(
                "self_reference",
                &self
                    .self_reference
                    .as_ref()
                    .map(|r| (r.foreign_key.name(), r.parent_key.name())),
            )
            .field("generated_key", &self.generated_key.as_ref().map(Accessor::name))
            .finish()
    }
}

/// Builder for [`EntitySchema`].
pub struct SchemaBuilder<T> {
    table: String,
    fields: Vec<Accessor<T>>,
    primary_key: Vec<String>,
    self_reference: Option<(String, String)>,
    generated_key: Option<String>,
}

impl<T> SchemaBuilder<T> {
    /// Adds a persisted field.
    #[must_use]
    pub fn field(mut self, accessor: Accessor<T>) -> Self {
        self.fields.push(accessor);
        self
    }

    /// Declares the primary-key fields, in key order.
    #[must_use]
    pub fn primary_key(mut self, names: &[&str]) -> Self {
        self.primary_key = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Declares that `foreign_key` references `parent_key` on another
    /// entity of the same type.
    #[must_use]
    pub fn self_reference(mut self, foreign_key: &str, parent_key: &str) -> Self {
        self.self_reference = Some((foreign_key.to_string(), parent_key.to_string()));
        self
    }

    /// Declares the field whose value the backend generates on insert.
    #[must_use]
    pub fn generated_key(mut self, name: &str) -> Self {
        self.generated_key = Some(name.to_string());
        self
    }

    /// Validates the description and builds the schema.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingPrimaryKey`] if no key field is declared
    /// - [`CoreError::UnknownField`] if a declared name has no field
    /// - [`CoreError::ReadOnlyField`] if the generated key or the
    ///   self-referencing foreign key has no setter
    /// - [`CoreError::InvalidOperation`] if two fields share a name
    pub fn build(self) -> CoreResult<EntitySchema<T>> {
        let table = self.table;
        if self.primary_key.is_empty() {
            return Err(CoreError::MissingPrimaryKey { table });
        }

        let mut by_name = HashMap::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name().to_string(), index).is_some() {
                return Err(CoreError::invalid_operation(format!(
                    "field {} declared twice on {table}",
                    field.name()
                )));
            }
        }

        let resolve = |name: &str| -> CoreResult<Accessor<T>> {
            by_name
                .get(name)
                .map(|&index| self.fields[index].clone())
                .ok_or_else(|| CoreError::unknown_field(&table, name))
        };
        let writable = |accessor: Accessor<T>| -> CoreResult<Accessor<T>> {
            if accessor.is_writable() {
                Ok(accessor)
            } else {
                Err(CoreError::read_only_field(&table, accessor.name()))
            }
        };

        let primary_key = self
            .primary_key
            .iter()
            .map(|name| resolve(name.as_str()))
            .collect::<CoreResult<Vec<_>>>()?;

        let self_reference = match &self.self_reference {
            Some((foreign_key, parent_key)) => Some(SelfReference {
                foreign_key: writable(resolve(foreign_key.as_str())?)?,
                parent_key: resolve(parent_key.as_str())?,
            }),
            None => None,
        };

        let generated_key = match &self.generated_key {
            Some(name) => Some(writable(resolve(name.as_str())?)?),
            None => None,
        };

        Ok(EntitySchema {
            table,
            fields: self.fields,
            by_name,
            primary_key,
            self_reference,
            generated_key,
        })
    }
}
