//! # entiflush value
//!
//! Type-erased field values for entiflush.
//!
//! The persistence engine never sees an entity's concrete fields. It reads
//! and writes them as [`Value`]s through accessors, which lets it:
//! - compare and hash primary keys of arbitrary entity types
//! - remap placeholder keys to backend-generated identities
//! - hand rows to a backend without knowing their shape
//!
//! ## Usage
//!
//! ```
//! use entiflush_value::{Value, ValueKind};
//!
//! let parent: Value = Some(10i64).into();
//! assert_eq!(parent, Value::Integer(10));
//!
//! // Null sorts before any non-null value.
//! assert!(Value::Null < Value::Integer(i64::MIN));
//!
//! // Generated identities are coerced to the declared key kind.
//! let id = Value::Text("42".into()).coerce(ValueKind::Integer).unwrap();
//! assert_eq!(id, Value::Integer(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod convert;
mod error;
mod value;

pub use error::{ValueError, ValueResult};
pub use value::{Value, ValueKind};
