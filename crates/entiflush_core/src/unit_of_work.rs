//! Unit of work: flushes the batches of several entity types together.

use crate::batch::{EntityBatch, IdentityMap};
use crate::config::{FlushConfig, FlushOrder};
use crate::error::{CoreError, CoreResult};
use crate::schema::{Entity, SchemaRegistry};
use crate::types::FlushStats;
use entiflush_backend::Backend;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span};

/// An entity batch with its type erased.
///
/// Lets a [`UnitOfWork`] hold batches of different entity types in one
/// list. Implemented for every [`EntityBatch<T>`] with `T: Entity`.
pub trait ErasedBatch: Send {
    /// Returns the table the batch writes to.
    fn table(&self) -> &str;

    /// Returns the entity type of the batch.
    fn entity_type(&self) -> TypeId;

    /// Returns true if `field` is part of the entity's primary key.
    fn is_key(&self, field: &str) -> bool;

    /// Returns true if nothing is staged.
    fn is_empty(&self) -> bool;

    /// Writes the pending inserts. See [`EntityBatch::write_inserted`].
    ///
    /// # Errors
    ///
    /// Propagates the batch's write error.
    fn write_inserted(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64>;

    /// Writes the pending updates. See [`EntityBatch::write_updated`].
    ///
    /// # Errors
    ///
    /// Propagates the batch's write error.
    fn write_updated(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64>;

    /// Writes the pending deletes. See [`EntityBatch::write_deleted`].
    ///
    /// # Errors
    ///
    /// Propagates the batch's write error.
    fn write_deleted(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64>;

    /// Returns the identities generated by written inserts.
    fn identities(&self) -> &IdentityMap;

    /// Rewrites the named foreign key of pending inserts.
    /// See [`EntityBatch::update_identities`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if the field does not exist, or
    /// the rewrite error.
    fn update_identities(&mut self, field: &str, identities: &IdentityMap) -> CoreResult<usize>;

    /// Upcasts to `Any` for downcasting to the concrete batch.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `Any` for downcasting to the concrete batch.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Upcasts to `Any` for taking the concrete batch back.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Entity> ErasedBatch for EntityBatch<T> {
    fn table(&self) -> &str {
        EntityBatch::table(self)
    }

    fn entity_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn is_key(&self, field: &str) -> bool {
        self.schema().is_key(field)
    }

    fn is_empty(&self) -> bool {
        EntityBatch::is_empty(self)
    }

    fn write_inserted(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64> {
        EntityBatch::write_inserted(self, backend, config)
    }

    fn write_updated(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64> {
        EntityBatch::write_updated(self, backend, config)
    }

    fn write_deleted(
        &mut self,
        backend: &mut dyn Backend,
        config: &FlushConfig,
    ) -> CoreResult<u64> {
        EntityBatch::write_deleted(self, backend, config)
    }

    fn identities(&self) -> &IdentityMap {
        EntityBatch::identities(self)
    }

    fn update_identities(&mut self, field: &str, identities: &IdentityMap) -> CoreResult<usize> {
        let schema = Arc::clone(self.schema());
        let foreign_key = schema.field(field)?;
        EntityBatch::update_identities(self, foreign_key, identities)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A foreign key from one entity type to another type's generated key.
#[derive(Debug, Clone)]
struct Link {
    dependent: TypeId,
    dependent_name: &'static str,
    principal: TypeId,
    principal_name: &'static str,
    foreign_key: String,
}

/// Stages changes for several entity types and writes them in one flush.
///
/// Batches are written in registration order, so identity producers must
/// be registered before their consumers. Registration happens on the first
/// call to [`UnitOfWork::register`] or [`UnitOfWork::batch_mut`] for a type.
///
/// A flush runs:
/// 1. deletes, in reverse registration order
/// 2. inserts, in registration order; after each batch's inserts, its
///    generated identities are propagated to the foreign keys of every
///    linked dependent batch
/// 3. updates, in registration order
///
/// With [`FlushOrder::InsertsFirst`] the first two steps swap.
///
/// Flushing again writes only the inserts staged since the previous flush;
/// staged updates and deletes are written again.
///
/// The unit of work neither opens nor commits a transaction. After a
/// failed flush the batches are in an indeterminate state and must be
/// discarded.
///
/// # Example
///
/// ```rust
/// use entiflush_backend::MemoryBackend;
/// use entiflush_core::{Accessor, CoreResult, Entity, EntitySchema, SchemaRegistry, UnitOfWork};
/// use entiflush_value::ValueKind;
/// use std::sync::Arc;
///
/// struct Team {
///     id: i64,
/// }
///
/// impl Entity for Team {
///     fn schema() -> CoreResult<EntitySchema<Self>> {
///         EntitySchema::builder("teams")
///             .field(
///                 Accessor::new("id", ValueKind::Integer, |t: &Team| t.id.into())
///                     .with_setter(|t, v| {
///                         t.id = v.try_into()?;
///                         Ok(())
///                     }),
///             )
///             .primary_key(&["id"])
///             .generated_key("id")
///             .build()
///     }
/// }
///
/// let mut backend = MemoryBackend::new().with_identity_table("teams", "id", 100);
/// let mut work = UnitOfWork::new(Arc::new(SchemaRegistry::new()));
/// work.batch_mut::<Team>().unwrap().insert(Team { id: -1 });
///
/// let stats = work.flush(&mut backend).unwrap();
/// assert_eq!(stats.inserted, 1);
/// assert_eq!(work.batch::<Team>().unwrap().inserted()[0].id, 100);
/// ```
pub struct UnitOfWork {
    registry: Arc<SchemaRegistry>,
    config: FlushConfig,
    batches: Vec<Box<dyn ErasedBatch>>,
    links: Vec<Link>,
}

impl UnitOfWork {
    /// Creates an empty unit of work with the default configuration.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self::with_config(registry, FlushConfig::default())
    }

    /// Creates an empty unit of work.
    #[must_use]
    pub fn with_config(registry: Arc<SchemaRegistry>, config: FlushConfig) -> Self {
        Self {
            registry,
            config,
            batches: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Returns the flush configuration.
    #[must_use]
    pub fn config(&self) -> &FlushConfig {
        &self.config
    }

    /// Returns the schema registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    fn position<T: Entity>(&self) -> Option<usize> {
        let wanted = TypeId::of::<T>();
        self.batches
            .iter()
            .position(|batch| batch.entity_type() == wanted)
    }

    fn position_of(&self, entity_type: TypeId) -> Option<usize> {
        self.batches
            .iter()
            .position(|batch| batch.entity_type() == entity_type)
    }

    /// Registers a batch for `T` if it has none yet, fixing its place in
    /// the write order.
    ///
    /// # Errors
    ///
    /// Returns the schema's build error on first registration.
    pub fn register<T: Entity>(&mut self) -> CoreResult<()> {
        self.batch_mut::<T>().map(|_| ())
    }

    /// Returns the batch for `T`, registering it on first use.
    ///
    /// # Errors
    ///
    /// Returns the schema's build error on first registration.
    pub fn batch_mut<T: Entity>(&mut self) -> CoreResult<&mut EntityBatch<T>> {
        let index = match self.position::<T>() {
            Some(index) => index,
            None => {
                let batch = EntityBatch::<T>::from_registry(&self.registry)?;
                debug!(table = batch.table(), "registered batch");
                self.batches.push(Box::new(batch));
                self.batches.len() - 1
            }
        };
        self.batches[index]
            .as_any_mut()
            .downcast_mut::<EntityBatch<T>>()
            .ok_or(CoreError::TypeMismatch {
                expected: std::any::type_name::<EntityBatch<T>>(),
            })
    }

    /// Returns the batch for `T`, if registered.
    #[must_use]
    pub fn batch<T: Entity>(&self) -> Option<&EntityBatch<T>> {
        self.batches[self.position::<T>()?]
            .as_any()
            .downcast_ref::<EntityBatch<T>>()
    }

    /// Removes the batch for `T` and hands it back.
    pub fn take<T: Entity>(&mut self) -> Option<EntityBatch<T>> {
        let index = self.position::<T>()?;
        let batch = self.batches.remove(index);
        batch.into_any().downcast::<EntityBatch<T>>().ok().map(|b| *b)
    }

    /// Declares that `foreign_key` on `D` holds keys generated for `P`.
    ///
    /// Identities generated while writing `P`'s inserts are propagated to
    /// `D`'s pending inserts before they are written. `P` must be registered
    /// before `D`; this is checked when flushing.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownField`] if `D` has no such field
    /// - [`CoreError::ReadOnlyField`] if the field has no setter
    /// - [`CoreError::InvalidOperation`] if `D` and `P` are the same type
    pub fn link<D: Entity, P: Entity>(&mut self, foreign_key: &str) -> CoreResult<()> {
        if TypeId::of::<D>() == TypeId::of::<P>() {
            return Err(CoreError::invalid_operation(format!(
                "{} cannot link to itself; declare a self reference instead",
                std::any::type_name::<D>()
            )));
        }

        let schema = self.registry.get::<D>()?;
        let field = schema.field(foreign_key)?;
        if !field.is_writable() {
            return Err(CoreError::read_only_field(schema.table(), foreign_key));
        }

        self.links.push(Link {
            dependent: TypeId::of::<D>(),
            dependent_name: std::any::type_name::<D>(),
            principal: TypeId::of::<P>(),
            principal_name: std::any::type_name::<P>(),
            foreign_key: foreign_key.to_string(),
        });
        Ok(())
    }

    /// Returns the number of registered batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Returns true if no batch has anything staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(|batch| batch.is_empty())
    }

    fn check_links(&self) -> CoreResult<()> {
        for link in &self.links {
            let (Some(principal), Some(dependent)) = (
                self.position_of(link.principal),
                self.position_of(link.dependent),
            ) else {
                continue;
            };
            if dependent < principal {
                return Err(CoreError::invalid_operation(format!(
                    "{} is registered before {}, whose identities it consumes",
                    link.dependent_name, link.principal_name
                )));
            }
        }
        Ok(())
    }

    /// Writes every batch against `backend`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a batch; nothing after it is
    /// written. [`CoreError::InvalidOperation`] is returned before any
    /// write if a link's dependent is registered before its principal.
    pub fn flush(&mut self, backend: &mut dyn Backend) -> CoreResult<FlushStats> {
        let span = info_span!("flush", batches = self.batches.len());
        let _guard = span.enter();

        self.check_links()?;

        let mut stats = FlushStats::default();
        match self.config.order {
            FlushOrder::DeletesFirst => {
                stats.deleted = self.write_deletes(backend)?;
                stats.inserted = self.write_inserts(backend)?;
            }
            FlushOrder::InsertsFirst => {
                stats.inserted = self.write_inserts(backend)?;
                stats.deleted = self.write_deletes(backend)?;
            }
        }
        for batch in &mut self.batches {
            stats.updated += batch.write_updated(backend, &self.config)?;
        }

        debug!(%stats, "flushed unit of work");
        Ok(stats)
    }

    fn write_deletes(&mut self, backend: &mut dyn Backend) -> CoreResult<u64> {
        let mut deleted = 0;
        for batch in self.batches.iter_mut().rev() {
            deleted += batch.write_deleted(backend, &self.config)?;
        }
        Ok(deleted)
    }

    fn write_inserts(&mut self, backend: &mut dyn Backend) -> CoreResult<u64> {
        let mut inserted = 0;
        for index in 0..self.batches.len() {
            inserted += self.batches[index].write_inserted(backend, &self.config)?;

            let (written, pending) = self.batches.split_at_mut(index + 1);
            let principal = &written[index];
            if principal.identities().is_empty() {
                continue;
            }

            let principal_type = principal.entity_type();
            for link in self.links.iter().filter(|l| l.principal == principal_type) {
                let Some(dependent) = pending
                    .iter_mut()
                    .find(|batch| batch.entity_type() == link.dependent)
                else {
                    continue;
                };
                let rewritten =
                    dependent.update_identities(&link.foreign_key, principal.identities())?;
                debug!(
                    from = principal.table(),
                    to = dependent.table(),
                    field = %link.foreign_key,
                    rewritten,
                    "propagated identities"
                );
            }
        }
        Ok(inserted)
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("config", &self.config)
            .field(
                "batches",
                &self.batches.iter().map(|b| b.table()).collect::<Vec<_>>(),
            )
            .field("links", &self.links.len())
            .finish()
    }
}
