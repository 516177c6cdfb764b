//! # entiflush testkit
//!
//! Test utilities for entiflush.
//!
//! This crate provides:
//! - Fixture entity types: a self-referencing [`Category`] tree, and
//!   [`Department`]/[`Account`] linked by a foreign key
//! - A [`memory_backend`] with tables and foreign keys for the fixtures
//! - Property-based test generators using proptest
//! - Test logging initialisation
//!
//! ## Usage
//!
//! ```rust
//! use entiflush_core::{EntityBatch, FlushConfig, SchemaRegistry};
//! use entiflush_testkit::prelude::*;
//!
//! init_test_logging();
//! let registry = SchemaRegistry::new();
//! let mut backend = memory_backend();
//! let mut batch = EntityBatch::<Department>::from_registry(&registry).unwrap();
//! batch.insert(Department::new(placeholder(0), "Research"));
//! batch.write_inserted(&mut backend, &FlushConfig::default()).unwrap();
//! assert_eq!(batch.inserted()[0].id, DEPARTMENT_SEED);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
