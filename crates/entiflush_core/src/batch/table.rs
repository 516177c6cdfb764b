//! Per-type entity batch.

use crate::batch::{ChangedFields, IdentityMap, PendingUpdate};
use crate::error::{CoreError, CoreResult};
use crate::schema::{Accessor, Entity, EntitySchema, SchemaRegistry};
use std::fmt;
use std::sync::Arc;

/// Pending inserts, updates and deletes for one entity type.
///
/// Staging never validates: errors surface when the batch is written. The
/// batch owns its entities. After the inserts are written, the entities
/// carry their generated keys and can be read back with
/// [`EntityBatch::inserted`] or taken with [`EntityBatch::into_inserted`].
///
/// Written inserts stay in the batch but are never written again; only
/// inserts staged since the last write are pending. Updates and deletes
/// are re-issued on every write.
///
/// An entity must appear in at most one list; the batch does not check.
///
/// A batch is not meant to be shared between threads while staging or
/// writing. Batches of different types may be written concurrently against
/// separate backends.
///
/// # Example
///
/// ```rust
/// use entiflush_core::{Accessor, CoreResult, Entity, EntityBatch, EntitySchema, SchemaRegistry};
/// use entiflush_value::ValueKind;
///
/// struct Tag {
///     id: i64,
/// }
///
/// impl Entity for Tag {
///     fn schema() -> CoreResult<EntitySchema<Self>> {
///         EntitySchema::builder("tags")
///             .field(Accessor::new("id", ValueKind::Integer, |t: &Tag| t.id.into()))
///             .primary_key(&["id"])
///             .build()
///     }
/// }
///
/// let registry = SchemaRegistry::new();
/// let mut batch = EntityBatch::<Tag>::from_registry(&registry).unwrap();
/// batch.insert(Tag { id: 1 });
/// batch.delete(Tag { id: 2 });
/// assert_eq!(batch.len(), 2);
/// ```
pub struct EntityBatch<T> {
    pub(crate) schema: Arc<EntitySchema<T>>,
    pub(crate) inserted: Vec<T>,
    pub(crate) updated: Vec<PendingUpdate<T>>,
    pub(crate) deleted: Vec<T>,
    pub(crate) identities: IdentityMap,
    /// Length of the prefix of `inserted` already written.
    pub(crate) written_inserts: usize,
}

impl<T> EntityBatch<T> {
    /// Creates an empty batch for a schema.
    #[must_use]
    pub fn new(schema: Arc<EntitySchema<T>>) -> Self {
        Self {
            schema,
            inserted: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            identities: IdentityMap::new(),
            written_inserts: 0,
        }
    }

    /// Returns the batch's schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<EntitySchema<T>> {
        &self.schema
    }

    /// Returns the table the batch writes to.
    #[must_use]
    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Stages an insert.
    pub fn insert(&mut self, entity: T) {
        self.inserted.push(entity);
    }

    /// Stages an update of the named fields. No names means every field.
    pub fn update(&mut self, entity: T, fields: &[&str]) {
        self.update_with(entity, ChangedFields::from_names(fields.iter().copied()));
    }

    /// Stages a whole-row update.
    pub fn update_all(&mut self, entity: T) {
        self.update_with(entity, ChangedFields::All);
    }

    /// Stages an update with an explicit field set.
    pub fn update_with(&mut self, entity: T, fields: ChangedFields) {
        self.updated.push(PendingUpdate { entity, fields });
    }

    /// Stages a delete. Only the key fields of `entity` are read.
    pub fn delete(&mut self, entity: T) {
        self.deleted.push(entity);
    }

    /// Returns every staged insert, in write order once written.
    #[must_use]
    pub fn inserted(&self) -> &[T] {
        &self.inserted
    }

    /// Returns the inserts not written yet.
    #[must_use]
    pub fn pending_inserts(&self) -> &[T] {
        &self.inserted[self.written_inserts..]
    }

    /// Returns the pending updates.
    #[must_use]
    pub fn updated(&self) -> &[PendingUpdate<T>] {
        &self.updated
    }

    /// Returns the pending deletes, in write order once written.
    #[must_use]
    pub fn deleted(&self) -> &[T] {
        &self.deleted
    }

    /// Returns the identities generated by written inserts.
    #[must_use]
    pub fn identities(&self) -> &IdentityMap {
        &self.identities
    }

    /// Consumes the batch and returns the inserted entities.
    #[must_use]
    pub fn into_inserted(self) -> Vec<T> {
        self.inserted
    }

    /// Returns the total number of staged entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every staged entity and recorded identity.
    pub fn clear(&mut self) {
        self.inserted.clear();
        self.updated.clear();
        self.deleted.clear();
        self.identities.clear();
        self.written_inserts = 0;
    }

    /// Rewrites `foreign_key` on every unwritten insert whose value is a
    /// placeholder in `identities`.
    ///
    /// Used to pick up identities generated by another entity type's batch
    /// before this batch is written. Identities are converted to the
    /// foreign key's declared kind. Updates and deletes are not touched.
    ///
    /// Returns the number of rewritten entities.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdentityConversion`] if an identity cannot be
    /// converted, or [`CoreError::ReadOnlyField`] if the field has no setter.
    pub fn update_identities(
        &mut self,
        foreign_key: &Accessor<T>,
        identities: &IdentityMap,
    ) -> CoreResult<usize> {
        if identities.is_empty() {
            return Ok(0);
        }

        let mut rewritten = 0;
        for entity in &mut self.inserted[self.written_inserts..] {
            let Some(new) = identities.resolve(&foreign_key.get(entity)) else {
                continue;
            };
            let new = new.clone().coerce(foreign_key.kind()).map_err(|source| {
                CoreError::IdentityConversion {
                    table: self.schema.table().to_string(),
                    field: foreign_key.name().to_string(),
                    source,
                }
            })?;
            foreign_key.set(entity, new)?;
            rewritten += 1;
        }
        Ok(rewritten)
    }
}

impl<T: Entity> EntityBatch<T> {
    /// Creates an empty batch using the registered schema for `T`.
    ///
    /// # Errors
    ///
    /// Returns the schema's build error on first registration.
    pub fn from_registry(registry: &SchemaRegistry) -> CoreResult<Self> {
        Ok(Self::new(registry.get::<T>()?))
    }
}

impl<T> fmt::Debug for EntityBatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityBatch")
            .field("table", &self.schema.table())
            .field("inserted", &self.inserted.len())
            .field("updated", &self.updated.len())
            .field("deleted", &self.deleted.len())
            .field("identities", &self.identities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entiflush_value::{Value, ValueKind};

    #[derive(Debug, Clone, PartialEq)]
    struct Account {
        id: i64,
        department: Option<i64>,
        code: Option<String>,
    }

    fn account(id: i64, department: Option<i64>) -> Account {
        Account {
            id,
            department,
            code: None,
        }
    }

    fn department() -> Accessor<Account> {
        Accessor::new("department", ValueKind::Integer, |a: &Account| {
            a.department.into()
        })
        .with_setter(|a, v| {
            a.department = v.try_into()?;
            Ok(())
        })
    }

    fn code() -> Accessor<Account> {
        Accessor::new("code", ValueKind::Text, |a: &Account| a.code.clone().into()).with_setter(
            |a, v| {
                a.code = v.try_into()?;
                Ok(())
            },
        )
    }

    fn batch() -> EntityBatch<Account> {
        let schema = EntitySchema::builder("accounts")
            .field(Accessor::new("id", ValueKind::Integer, |a: &Account| a.id.into()))
            .field(department())
            .field(code())
            .primary_key(&["id"])
            .build()
            .unwrap();
        EntityBatch::new(Arc::new(schema))
    }

    #[test]
    fn staging_appends_in_order() {
        let mut batch = batch();
        batch.insert(account(1, None));
        batch.insert(account(2, None));
        batch.update(account(3, None), &[]);
        batch.update(account(4, None), &["code"]);
        batch.delete(account(5, None));

        assert_eq!(batch.len(), 5);
        assert_eq!(batch.inserted()[1].id, 2);
        assert!(batch.updated()[0].fields.is_all());
        assert_eq!(
            batch.updated()[1].fields,
            ChangedFields::Only(vec!["code".into()])
        );

        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn update_identities_rewrites_inserts_only() {
        let mut batch = batch();
        batch.insert(account(1, Some(-1)));
        batch.insert(account(2, Some(-2)));
        batch.insert(account(3, None));
        batch.update_all(account(4, Some(-1)));

        let map: IdentityMap = [(Value::Integer(-1), Value::Integer(7))].into_iter().collect();
        let rewritten = batch.update_identities(&department(), &map).unwrap();

        assert_eq!(rewritten, 1);
        assert_eq!(batch.inserted()[0].department, Some(7));
        assert_eq!(batch.inserted()[1].department, Some(-2));
        assert_eq!(batch.updated()[0].entity.department, Some(-1));
    }

    #[test]
    fn update_identities_converts_to_field_kind() {
        let mut accounts = batch();
        let mut pending = account(1, None);
        pending.code = Some("-1".into());
        accounts.insert(pending);

        let map: IdentityMap = [(Value::from("-1"), Value::Integer(12))].into_iter().collect();
        accounts.update_identities(&code(), &map).unwrap();
        assert_eq!(accounts.inserted()[0].code.as_deref(), Some("12"));

        let mut other = batch();
        other.insert(account(1, Some(-1)));
        let bad: IdentityMap = [(Value::Integer(-1), Value::from("x"))].into_iter().collect();
        let err = other.update_identities(&department(), &bad).unwrap_err();
        assert!(matches!(err, CoreError::IdentityConversion { .. }));
    }

    #[test]
    fn update_identities_skips_written_inserts() {
        let mut accounts = batch();
        accounts.insert(account(1, Some(-1)));
        accounts.insert(account(2, Some(-1)));
        accounts.written_inserts = 1;

        let map: IdentityMap = [(Value::Integer(-1), Value::Integer(7))].into_iter().collect();
        assert_eq!(accounts.update_identities(&department(), &map).unwrap(), 1);
        assert_eq!(accounts.inserted()[0].department, Some(-1));
        assert_eq!(accounts.pending_inserts()[0].department, Some(7));

        accounts.clear();
        assert!(accounts.pending_inserts().is_empty());
    }

    #[test]
    fn into_inserted_returns_entities() {
        let mut batch = batch();
        batch.insert(account(9, None));
        assert_eq!(batch.into_inserted(), vec![account(9, None)]);
    }
}
