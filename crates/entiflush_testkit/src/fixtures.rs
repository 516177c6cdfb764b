//! Fixture entity types and backend helpers.
//!
//! The fixtures model a small catalogue:
//! - [`Category`] is a self-referencing tree with generated keys
//! - [`Department`] has a generated key and no references
//! - [`Account`] has a caller-assigned key and a foreign key to
//!   [`Department`]

use entiflush_backend::{Backend, MemoryBackend};
use entiflush_core::{Accessor, CoreError, CoreResult, Entity, EntitySchema, SchemaRegistry};
use entiflush_value::ValueKind;

/// First identity the backend from [`memory_backend`] generates for
/// categories.
pub const CATEGORY_SEED: i64 = 10;

/// First identity the backend from [`memory_backend`] generates for
/// departments.
pub const DEPARTMENT_SEED: i64 = 7;

/// A node of a category tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Key, generated by the backend. Negative values are placeholders.
    pub id: i64,
    /// Parent category, if any.
    pub parent_id: Option<i64>,
    /// Display name.
    pub name: String,
}

impl Category {
    /// Creates a category.
    pub fn new(id: i64, parent_id: Option<i64>, name: &str) -> Self {
        Self {
            id,
            parent_id,
            name: name.to_string(),
        }
    }
}

impl Entity for Category {
    fn schema() -> CoreResult<EntitySchema<Self>> {
        EntitySchema::builder("categories")
            .field(
                Accessor::new("id", ValueKind::Integer, |c: &Category| c.id.into()).with_setter(
                    |c, v| {
                        c.id = v.try_into()?;
                        Ok(())
                    },
                ),
            )
            .field(
                Accessor::new("parent_id", ValueKind::Integer, |c: &Category| {
                    c.parent_id.into()
                })
                .with_setter(|c, v| {
                    c.parent_id = v.try_into()?;
                    Ok(())
                }),
            )
            .field(
                Accessor::new("name", ValueKind::Text, |c: &Category| c.name.clone().into())
                    .with_setter(|c, v| {
                        c.name = v.try_into()?;
                        Ok(())
                    }),
            )
            .primary_key(&["id"])
            .self_reference("parent_id", "id")
            .generated_key("id")
            .build()
    }
}

/// A department, referenced by accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    /// Key, generated by the backend. Negative values are placeholders.
    pub id: i64,
    /// Department name.
    pub name: String,
}

impl Department {
    /// Creates a department.
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

impl Entity for Department {
    fn schema() -> CoreResult<EntitySchema<Self>> {
        EntitySchema::builder("departments")
            .field(
                Accessor::new("id", ValueKind::Integer, |d: &Department| d.id.into())
                    .with_setter(|d, v| {
                        d.id = v.try_into()?;
                        Ok(())
                    }),
            )
            .field(Accessor::new("name", ValueKind::Text, |d: &Department| {
                d.name.clone().into()
            }))
            .primary_key(&["id"])
            .generated_key("id")
            .build()
    }
}

/// An account belonging to a department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Key, assigned by the caller.
    pub id: i64,
    /// Owning department, if any.
    pub department_id: Option<i64>,
    /// Contact address.
    pub email: String,
}

impl Account {
    /// Creates an account.
    pub fn new(id: i64, department_id: Option<i64>, email: &str) -> Self {
        Self {
            id,
            department_id,
            email: email.to_string(),
        }
    }
}

impl Entity for Account {
    fn schema() -> CoreResult<EntitySchema<Self>> {
        EntitySchema::builder("accounts")
            .field(Accessor::new("id", ValueKind::Integer, |a: &Account| {
                a.id.into()
            }))
            .field(
                Accessor::new("department_id", ValueKind::Integer, |a: &Account| {
                    a.department_id.into()
                })
                .with_setter(|a, v| {
                    a.department_id = v.try_into()?;
                    Ok(())
                }),
            )
            .field(
                Accessor::new("email", ValueKind::Text, |a: &Account| a.email.clone().into())
                    .with_setter(|a, v| {
                        a.email = v.try_into()?;
                        Ok(())
                    }),
            )
            .primary_key(&["id"])
            .build()
    }
}

/// Creates a backend with tables and foreign keys for every fixture type.
///
/// Category identities start at [`CATEGORY_SEED`], department identities
/// at [`DEPARTMENT_SEED`].
pub fn memory_backend() -> MemoryBackend {
    MemoryBackend::new()
        .with_identity_table("categories", "id", CATEGORY_SEED)
        .with_foreign_key("categories", "parent_id", "categories", "id")
        .with_identity_table("departments", "id", DEPARTMENT_SEED)
        .with_table("accounts", &["id"])
        .with_foreign_key("accounts", "department_id", "departments", "id")
}

/// Writes existing rows straight to the backend, bypassing any batch.
///
/// Seeded rows do not advance the backend's identity sequence.
///
/// # Errors
///
/// Returns [`CoreError::Backend`] if a row is rejected.
pub fn seed<T: Entity>(
    backend: &mut MemoryBackend,
    registry: &SchemaRegistry,
    entities: &[T],
) -> CoreResult<()> {
    let schema = registry.get::<T>()?;
    for entity in entities {
        backend
            .insert(schema.table(), &schema.row(entity))
            .map_err(|source| CoreError::backend(schema.table(), source))?;
    }
    backend.clear_calls();
    Ok(())
}

/// Returns the placeholder key used for the `index`-th new entity.
pub const fn placeholder(index: usize) -> i64 {
    -(index as i64) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_schemas_build() {
        let registry = SchemaRegistry::new();
        assert!(registry.get::<Category>().unwrap().self_reference().is_some());
        assert!(registry.get::<Department>().unwrap().generated_key().is_some());
        assert!(registry.get::<Account>().unwrap().generated_key().is_none());
    }

    #[test]
    fn seed_writes_rows() {
        let registry = SchemaRegistry::new();
        let mut backend = memory_backend();
        seed(
            &mut backend,
            &registry,
            &[Category::new(1, None, "root"), Category::new(2, Some(1), "child")],
        )
        .unwrap();
        assert_eq!(backend.rows("categories").unwrap().len(), 2);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn placeholders_are_negative() {
        assert_eq!(placeholder(0), -1);
        assert_eq!(placeholder(2), -3);
    }
}
