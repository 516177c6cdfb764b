//! Entity schemas and field accessors.
//!
//! The engine never reflects over entity types. Each type describes itself
//! once through [`Entity::schema`]:
//! - the persisted fields, as [`Accessor`]s
//! - the primary key
//! - an optional [`SelfReference`] for hierarchical types
//! - an optional backend-generated key
//!
//! Schemas are cached per type by the [`SchemaRegistry`].

mod accessor;
mod entity;
mod registry;

pub use accessor::{Accessor, Getter, Setter};
pub use entity::{Entity, EntitySchema, SchemaBuilder, SelfReference};
pub use registry::SchemaRegistry;
