//! Type-erased schema registry.

use crate::error::{CoreError, CoreResult};
use crate::schema::{Entity, EntitySchema};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Caches one [`EntitySchema`] per entity type.
///
/// Schemas are built on first use and never change afterwards. Concurrent
/// first uses may each build a schema; the first one inserted wins and the
/// others are dropped, so every caller observes the same `Arc`.
///
/// The registry is a capability handed to the engine (usually behind an
/// `Arc`), not a global.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema for `T`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Entity::schema`] if the description is
    /// invalid. Nothing is cached in that case.
    pub fn get<T: Entity>(&self) -> CoreResult<Arc<EntitySchema<T>>> {
        if let Some(schema) = self.lookup::<T>() {
            return Ok(schema);
        }

        let built: Arc<dyn Any + Send + Sync> = Arc::new(T::schema()?);
        let winner = {
            let mut schemas = self.schemas.write();
            Arc::clone(schemas.entry(TypeId::of::<T>()).or_insert(built))
        };
        debug!(entity = std::any::type_name::<T>(), "registered schema");

        Self::downcast(winner)
    }

    /// Returns the schema for `T` if it has been registered.
    #[must_use]
    pub fn lookup<T: Entity>(&self) -> Option<Arc<EntitySchema<T>>> {
        let schema = self.schemas.read().get(&TypeId::of::<T>()).cloned()?;
        Self::downcast(schema).ok()
    }

    /// Returns true if a schema for `T` has been registered.
    #[must_use]
    pub fn contains<T: Entity>(&self) -> bool {
        self.schemas.read().contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    /// Returns true if no schema has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn downcast<T: Entity>(schema: Arc<dyn Any + Send + Sync>) -> CoreResult<Arc<EntitySchema<T>>> {
        schema
            .downcast::<EntitySchema<T>>()
            .map_err(|_| CoreError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            })
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Accessor;
    use entiflush_value::ValueKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Tag {
        id: i64,
    }

    impl Entity for Tag {
        fn schema() -> CoreResult<EntitySchema<Self>> {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            EntitySchema::builder("tags")
                .field(Accessor::new("id", ValueKind::Integer, |t: &Tag| {
                    t.id.into()
                }))
                .primary_key(&["id"])
                .build()
        }
    }

    struct Label {
        code: String,
    }

    impl Entity for Label {
        fn schema() -> CoreResult<EntitySchema<Self>> {
            EntitySchema::builder("labels")
                .field(Accessor::new("code", ValueKind::Text, |l: &Label| {
                    l.code.clone().into()
                }))
                .primary_key(&["code"])
                .build()
        }
    }

    struct Broken;

    impl Entity for Broken {
        fn schema() -> CoreResult<EntitySchema<Self>> {
            EntitySchema::builder("broken").build()
        }
    }

    #[test]
    fn get_returns_same_schema() {
        let registry = SchemaRegistry::new();
        let before = BUILDS.load(Ordering::SeqCst);

        let first = registry.get::<Tag>().unwrap();
        let second = registry.get::<Tag>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILDS.load(Ordering::SeqCst) - before, 1);
        assert_eq!(first.table(), "tags");
        assert!(registry.contains::<Tag>());
    }

    #[test]
    fn invalid_schema_is_not_cached() {
        let registry = SchemaRegistry::new();
        assert!(registry.get::<Broken>().is_err());
        assert!(!registry.contains::<Broken>());
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_first_use_agrees() {
        let registry = Arc::new(SchemaRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get::<Label>().unwrap())
            })
            .collect();

        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for schema in &schemas[1..] {
            assert!(Arc::ptr_eq(&schemas[0], schema));
        }
        assert_eq!(registry.len(), 1);
    }
}
