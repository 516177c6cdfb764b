//! Write dispatch: turns a batch's lists into backend calls.
//!
//! Each list is written in one pass. The first backend failure aborts the
//! rest of the list; rows already written stay written, and committing or
//! rolling back is left to whoever owns the transaction.

use crate::batch::ordering::{self, Direction};
use crate::batch::{ChangedFields, EntityBatch};
use crate::config::FlushConfig;
use crate::error::{CoreError, CoreResult};
use crate::schema::{Accessor, EntitySchema};
use entiflush_backend::{Backend, BackendError, Row};
use entiflush_value::Value;
use std::sync::Arc;
use tracing::{debug, warn};

impl<T> EntityBatch<T> {
    /// Writes the pending inserts, parents first.
    ///
    /// For a type with a generated key, each row is written with
    /// [`Backend::insert_with_identity`]. The generated identity is
    /// converted to the key's declared kind, assigned to the entity and
    /// recorded against the placeholder key. If the type references itself
    /// through the generated key, the in-batch children of the row are
    /// rewritten to the new identity before they are written.
    ///
    /// Inserts written by an earlier call are skipped, so calling this
    /// again only writes what was staged since.
    ///
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnresolvableSelfReference`] if the inserts cannot be
    ///   ordered; nothing is written in that case
    /// - [`CoreError::Backend`] if a write fails
    /// - [`CoreError::IdentityConversion`] or [`CoreError::DuplicateIdentity`]
    ///   if a generated identity cannot be recorded
    pub fn write_inserted(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64> {
        let start = self.written_inserts;
        if start == self.inserted.len() {
            return Ok(0);
        }

        let schema = Arc::clone(&self.schema);
        let table = schema.table();
        let strict = config.strict_self_references.then_some(&self.identities);
        let order = ordering::dependency_order(
            &schema,
            &self.inserted[start..],
            Direction::ParentsFirst,
            strict,
        )?;
        let mut pending = self.inserted.split_off(start);
        ordering::apply_order(&mut pending, order.indices());
        self.inserted.append(&mut pending);
        let children = order.children_by_position();

        let generated = schema.generated_key();
        let rewrite = schema
            .self_reference()
            .filter(|reference| {
                generated.is_some_and(|key| key.name() == reference.parent_key().name())
            })
            .map(|reference| reference.foreign_key());

        let mut written = 0u64;
        for (offset, children) in children.iter().enumerate() {
            let index = start + offset;
            let row = schema.row(&self.inserted[index]);
            match generated {
                None => {
                    backend
                        .insert(table, &row)
                        .map_err(|source| aborted(table, "insert", index, source))?;
                    self.written_inserts = index + 1;
                }
                Some(key) => {
                    let identity = backend
                        .insert_with_identity(table, &row, key.name())
                        .map_err(|source| aborted(table, "insert", index, source))?;
                    self.written_inserts = index + 1;
                    let targets =
                        rewrite.map(|foreign_key| (foreign_key, start, children.as_slice()));
                    self.assign_identity(key, index, identity, targets)?;
                }
            }
            written += 1;
        }

        debug!(
            table,
            rows = written,
            identities = self.identities.len(),
            "wrote inserted rows"
        );
        Ok(written)
    }

    /// Assigns `identity` to the insert at `index`. When `rewrite` is given,
    /// its children (positions relative to the base offset) that still hold
    /// the placeholder are pointed at the identity.
    fn assign_identity(
        &mut self,
        key: &Accessor<T>,
        index: usize,
        identity: Value,
        rewrite: Option<(&Accessor<T>, usize, &[usize])>,
    ) -> CoreResult<()> {
        let table = self.schema.table();
        let new = identity
            .coerce(key.kind())
            .map_err(|source| CoreError::IdentityConversion {
                table: table.to_string(),
                field: key.name().to_string(),
                source,
            })?;

        let entity = &mut self.inserted[index];
        let old = key.get(entity);
        key.set(entity, new.clone())?;

        if old.is_null() {
            return Ok(());
        }
        self.identities.record(table, old.clone(), new.clone())?;
        if let Some((foreign_key, base, children)) = rewrite {
            let pending = &mut self.inserted[base..];
            ordering::rewrite_parent_keys(foreign_key, pending, children, &old, &new)?;
        }
        Ok(())
    }

    /// Writes the pending updates.
    ///
    /// Every entry is validated before the first backend call: key fields
    /// are dropped from the changed set, and an entry left with nothing to
    /// write fails the whole list. A whole-row entry writes every non-key
    /// field.
    ///
    /// Returns the number of rows the backend reported as affected.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownField`] if an entry names a field the type
    ///   does not have
    /// - [`CoreError::EmptyUpdateSet`] if an entry changes no non-key field
    /// - [`CoreError::Backend`] if a write fails
    /// - [`CoreError::RowNotFound`] if a write affects no row and
    ///   [`FlushConfig::verify_affected_rows`] is set
    pub fn write_updated(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64> {
        if self.updated.is_empty() {
            return Ok(0);
        }

        let schema = &self.schema;
        let table = schema.table();
        let writes = self
            .updated
            .iter()
            .map(|pending| {
                let set = changed_row(schema, &pending.entity, &pending.fields)?;
                Ok((schema.key_row(&pending.entity), set))
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let mut affected = 0u64;
        for (index, (key, set)) in writes.iter().enumerate() {
            let count = backend
                .update(table, key, set)
                .map_err(|source| aborted(table, "update", index, source))?;
            verify(config, table, count, key)?;
            affected += count;
        }

        debug!(table, entries = writes.len(), rows = affected, "wrote updated rows");
        Ok(affected)
    }

    /// Writes the pending deletes, children first.
    ///
    /// Returns the number of rows the backend reported as affected.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnresolvableSelfReference`] if the deletes cannot be
    ///   ordered; nothing is written in that case
    /// - [`CoreError::Backend`] if a write fails
    /// - [`CoreError::RowNotFound`] if a delete affects no row and
    ///   [`FlushConfig::verify_affected_rows`] is set
    pub fn write_deleted(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64> {
        if self.deleted.is_empty() {
            return Ok(0);
        }

        let schema = Arc::clone(&self.schema);
        let table = schema.table();
        let order =
            ordering::dependency_order(&schema, &self.deleted, Direction::ChildrenFirst, None)?;
        ordering::apply_order(&mut self.deleted, order.indices());

        let mut affected = 0u64;
        for (index, entity) in self.deleted.iter().enumerate() {
            let key = schema.key_row(entity);
            let count = backend
                .delete(table, &key)
                .map_err(|source| aborted(table, "delete", index, source))?;
            verify(config, table, count, &key)?;
            affected += count;
        }

        debug!(table, entries = self.deleted.len(), rows = affected, "wrote deleted rows");
        Ok(affected)
    }
}

/// Builds the columns an update writes, without key fields.
fn changed_row<T>(
    schema: &EntitySchema<T>,
    entity: &T,
    fields: &ChangedFields,
) -> CoreResult<Row> {
    let mut set = Row::new();
    match fields {
        ChangedFields::All => {
            for field in schema.fields() {
                if !schema.is_key(field.name()) {
                    set.push(field.name(), field.get(entity));
                }
            }
        }
        ChangedFields::Only(names) => {
            for name in names {
                let field = schema.field(name)?;
                if !schema.is_key(name) && !set.contains(name) {
                    set.push(field.name(), field.get(entity));
                }
            }
        }
    }

    if set.is_empty() {
        return Err(CoreError::empty_update_set(schema.table()));
    }
    Ok(set)
}

fn verify(config: &FlushConfig, table: &str, affected: u64, key: &Row) -> CoreResult<()> {
    if config.verify_affected_rows && affected == 0 {
        return Err(CoreError::RowNotFound {
            table: table.to_string(),
            key: key.to_string(),
        });
    }
    Ok(())
}

fn aborted(table: &str, operation: &'static str, index: usize, source: BackendError) -> CoreError {
    warn!(table, operation, index, error = %source, "write aborted");
    CoreError::backend(table, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlushConfig;
    use entiflush_backend::{BackendCall, MemoryBackend, Operation};
    use entiflush_value::ValueKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Folder {
        id: i64,
        parent: Option<i64>,
        title: String,
    }

    fn folder(id: i64, parent: Option<i64>, title: &str) -> Folder {
        Folder {
            id,
            parent,
            title: title.to_string(),
        }
    }

    fn schema(generated: bool) -> Arc<EntitySchema<Folder>> {
        let builder = EntitySchema::builder("folders")
            .field(
                Accessor::new("id", ValueKind::Integer, |f: &Folder| f.id.into()).with_setter(
                    |f, v| {
                        f.id = v.try_into()?;
                        Ok(())
                    },
                ),
            )
            .field(
                Accessor::new("parent", ValueKind::Integer, |f: &Folder| f.parent.into())
                    .with_setter(|f, v| {
                        f.parent = v.try_into()?;
                        Ok(())
                    }),
            )
            .field(Accessor::new("title", ValueKind::Text, |f: &Folder| {
                f.title.clone().into()
            }))
            .primary_key(&["id"])
            .self_reference("parent", "id");
        let builder = if generated {
            builder.generated_key("id")
        } else {
            builder
        };
        Arc::new(builder.build().unwrap())
    }

    fn backend(first_id: i64) -> MemoryBackend {
        MemoryBackend::new()
            .with_identity_table("folders", "id", first_id)
            .with_foreign_key("folders", "parent", "folders", "id")
    }

    #[test]
    fn generated_keys_rewrite_children() {
        let mut batch = EntityBatch::new(schema(true));
        batch.insert(folder(-1, Some(-2), "child"));
        batch.insert(folder(-2, None, "root"));
        batch.insert(folder(-3, Some(-1), "leaf"));

        let mut backend = backend(10);
        let written = batch
            .write_inserted(&mut backend, &FlushConfig::default())
            .unwrap();

        assert_eq!(written, 3);
        let ids: Vec<_> = batch.inserted().iter().map(|f| (f.id, f.parent)).collect();
        assert_eq!(ids, [(10, None), (11, Some(10)), (12, Some(11))]);
        assert_eq!(
            batch.identities().resolve(&Value::Integer(-3)),
            Some(&Value::Integer(12))
        );
    }

    #[test]
    fn placeholder_equal_to_generated_identity() {
        let mut batch = EntityBatch::new(schema(true));
        batch.insert(folder(1, None, "root"));
        batch.insert(folder(10, None, "other root"));
        batch.insert(folder(3, Some(1), "child of root"));

        let mut backend = backend(10);
        batch
            .write_inserted(&mut backend, &FlushConfig::default())
            .unwrap();

        let ids: Vec<_> = batch.inserted().iter().map(|f| (f.id, f.parent)).collect();
        assert_eq!(ids, [(10, None), (11, None), (12, Some(10))]);
    }

    #[test]
    fn second_write_only_inserts_new_entities() {
        let mut batch = EntityBatch::new(schema(true));
        batch.insert(folder(-1, None, "root"));
        let mut backend = backend(1);
        let config = FlushConfig::default();
        assert_eq!(batch.write_inserted(&mut backend, &config).unwrap(), 1);

        backend.clear_calls();
        assert_eq!(batch.write_inserted(&mut backend, &config).unwrap(), 0);
        assert!(backend.calls().is_empty());

        batch.insert(folder(-2, Some(-3), "child"));
        batch.insert(folder(-3, None, "second root"));
        assert_eq!(batch.write_inserted(&mut backend, &config).unwrap(), 2);

        let ids: Vec<_> = batch.inserted().iter().map(|f| (f.id, f.parent)).collect();
        assert_eq!(ids, [(1, None), (2, None), (3, Some(2))]);
        assert_eq!(backend.rows("folders").unwrap().len(), 3);
        assert!(batch.pending_inserts().is_empty());
    }

    #[test]
    fn plain_insert_keeps_keys() {
        let mut batch = EntityBatch::new(schema(false));
        batch.insert(folder(2, Some(1), "child"));
        batch.insert(folder(1, None, "root"));

        let mut backend = MemoryBackend::new()
            .with_table("folders", &["id"])
            .with_foreign_key("folders", "parent", "folders", "id");
        batch
            .write_inserted(&mut backend, &FlushConfig::default())
            .unwrap();

        assert!(batch.identities().is_empty());
        assert_eq!(batch.inserted()[0].id, 1);
        assert_eq!(backend.rows("folders").unwrap().len(), 2);
    }

    #[test]
    fn empty_update_issues_no_calls() {
        let mut batch = EntityBatch::new(schema(false));
        batch.update(folder(1, None, "a"), &["title"]);
        batch.update(folder(2, None, "b"), &["id"]);

        let mut backend = MemoryBackend::new().with_table("folders", &["id"]);
        let err = batch
            .write_updated(&mut backend, &FlushConfig::default())
            .unwrap_err();

        assert!(matches!(err, CoreError::EmptyUpdateSet { .. }));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn partial_update_excludes_keys() {
        let mut batch = EntityBatch::new(schema(false));
        batch.update(folder(1, None, "renamed"), &["id", "title", "title"]);
        batch.update_all(folder(2, Some(1), "moved"));

        let mut backend = MemoryBackend::new().with_table("folders", &["id"]);
        for (id, title) in [(1i64, "a"), (2, "b")] {
            let row = Row::new()
                .with("id", id)
                .with("parent", Value::Null)
                .with("title", title);
            backend.insert("folders", &row).unwrap();
        }
        backend.clear_calls();

        let affected = batch
            .write_updated(&mut backend, &FlushConfig::default())
            .unwrap();
        assert_eq!(affected, 2);

        let calls = backend.calls();
        let BackendCall::Update { set, .. } = &calls[0] else {
            panic!("expected update, got {:?}", calls[0]);
        };
        assert_eq!(set.column_names().collect::<Vec<_>>(), ["title"]);
        let BackendCall::Update { set, .. } = &calls[1] else {
            panic!("expected update, got {:?}", calls[1]);
        };
        assert_eq!(set.column_names().collect::<Vec<_>>(), ["parent", "title"]);
    }

    #[test]
    fn unknown_update_field() {
        let mut batch = EntityBatch::new(schema(false));
        batch.update(folder(1, None, "a"), &["colour"]);
        let mut backend = MemoryBackend::new().with_table("folders", &["id"]);
        let err = batch
            .write_updated(&mut backend, &FlushConfig::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownField { .. }));
    }

    #[test]
    fn deletes_children_first() {
        let mut backend = MemoryBackend::new()
            .with_table("folders", &["id"])
            .with_foreign_key("folders", "parent", "folders", "id");
        let mut seed = EntityBatch::new(schema(false));
        seed.insert(folder(1, None, "root"));
        seed.insert(folder(2, Some(1), "mid"));
        seed.insert(folder(3, Some(2), "leaf"));
        seed.write_inserted(&mut backend, &FlushConfig::default())
            .unwrap();
        backend.clear_calls();

        let mut batch = EntityBatch::new(schema(false));
        batch.delete(folder(1, None, ""));
        batch.delete(folder(2, Some(1), ""));
        batch.delete(folder(3, Some(2), ""));
        let affected = batch
            .write_deleted(&mut backend, &FlushConfig::default())
            .unwrap();

        assert_eq!(affected, 3);
        let keys: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Delete { key, .. } => key.get("id").cloned(),
                _ => None,
            })
            .collect();
        assert_eq!(keys, [Value::Integer(3), Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn missing_row_is_reported_when_verifying() {
        let mut batch = EntityBatch::new(schema(false));
        batch.delete(folder(42, None, ""));
        let mut backend = MemoryBackend::new().with_table("folders", &["id"]);

        let lenient = batch
            .write_deleted(&mut backend, &FlushConfig::default())
            .unwrap();
        assert_eq!(lenient, 0);

        let err = batch
            .write_deleted(&mut backend, &FlushConfig::new().verify_affected_rows(true))
            .unwrap_err();
        assert!(matches!(err, CoreError::RowNotFound { .. }));
    }

    #[test]
    fn backend_failure_aborts_list() {
        let mut batch = EntityBatch::new(schema(true));
        batch.insert(folder(-1, None, "a"));
        batch.insert(folder(-2, None, "b"));
        batch.insert(folder(-3, None, "c"));

        let mut backend = backend(1).fail_on("folders", Operation::Insert, 2);
        let err = batch
            .write_inserted(&mut backend, &FlushConfig::default())
            .unwrap_err();

        assert!(err.is_backend());
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(batch.identities().len(), 1);
        assert_eq!(batch.pending_inserts().len(), 2);
    }
}
