//! # entiflush core
//!
//! Change tracking and ordered persistence for batches of entities.
//!
//! This crate provides:
//! - Field accessors and per-type schemas, cached in a [`SchemaRegistry`]
//! - Structural comparers over type-erased entity references
//! - Entity batches holding pending inserts, updates and deletes
//! - Dependency-aware ordering for self-referencing entity types
//! - Identity propagation for backend-generated keys, within a batch and
//!   across entity types
//! - A write dispatcher and a [`UnitOfWork`] that flushes several batches
//!
//! ## Design Principles
//!
//! - The engine never decides *which* rows change; callers stage them
//! - No reflection: each type describes its fields once through [`Entity`]
//! - Writes go through the [`entiflush_backend::Backend`] trait; no SQL here
//! - Errors always propagate; nothing is skipped or retried
//! - Transactions belong to the caller
//!
//! ## Write Order
//!
//! Within one batch, inserts are written parents first and deletes children
//! first. The order computed before the first write is exactly the order in
//! which backend calls are issued. Across entity types, batches are written
//! in the order the caller registers them.
//!
//! ## Example
//!
//! ```rust
//! use entiflush_backend::MemoryBackend;
//! use entiflush_core::{
//!     Accessor, CoreResult, Entity, EntityBatch, EntitySchema, FlushConfig, SchemaRegistry,
//! };
//! use entiflush_value::ValueKind;
//!
//! struct Category {
//!     id: i64,
//!     parent_id: Option<i64>,
//! }
//!
//! impl Entity for Category {
//!     fn schema() -> CoreResult<EntitySchema<Self>> {
//!         EntitySchema::builder("categories")
//!             .field(
//!                 Accessor::new("id", ValueKind::Integer, |c: &Category| c.id.into())
//!                     .with_setter(|c, v| {
//!                         c.id = v.try_into()?;
//!                         Ok(())
//!                     }),
//!             )
//!             .field(
//!                 Accessor::new("parent_id", ValueKind::Integer, |c: &Category| {
//!                     c.parent_id.into()
//!                 })
//!                 .with_setter(|c, v| {
//!                     c.parent_id = v.try_into()?;
//!                     Ok(())
//!                 }),
//!             )
//!             .primary_key(&["id"])
//!             .self_reference("parent_id", "id")
//!             .generated_key("id")
//!             .build()
//!     }
//! }
//!
//! let registry = SchemaRegistry::new();
//! let mut batch = EntityBatch::<Category>::from_registry(&registry).unwrap();
//! batch.insert(Category { id: -1, parent_id: Some(-2) });
//! batch.insert(Category { id: -2, parent_id: None });
//!
//! let mut backend = MemoryBackend::new().with_identity_table("categories", "id", 10);
//! batch.write_inserted(&mut backend, &FlushConfig::default()).unwrap();
//!
//! let written: Vec<_> = batch.inserted().iter().map(|c| (c.id, c.parent_id)).collect();
//! assert_eq!(written, [(10, None), (11, Some(10))]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod comparer;
mod config;
mod dispatch;
mod error;
mod schema;
mod types;
mod unit_of_work;

pub use batch::{ChangedFields, EntityBatch, IdentityMap, PendingUpdate};
pub use comparer::{ComparerCache, KeyRef, StructuralComparer, TypedComparer};
pub use config::{FlushConfig, FlushOrder};
pub use error::{CoreError, CoreResult};
pub use schema::{
    Accessor, Entity, EntitySchema, Getter, SchemaBuilder, SchemaRegistry, SelfReference, Setter,
};
pub use types::FlushStats;
pub use unit_of_work::{ErasedBatch, UnitOfWork};
