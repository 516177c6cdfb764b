//! # entiflush backend
//!
//! Backend connection contract and implementations for entiflush.
//!
//! The persistence engine never issues SQL. It sequences calls against a
//! [`Backend`]: plain inserts, inserts returning a generated identity,
//! deletes by key, and partial or whole-row updates by key. Each call
//! carries a [`Row`] of type-erased column values.
//!
//! ## Design Principles
//!
//! - Backends execute one write per call and report affected rows
//! - No knowledge of entity types, batches or ordering
//! - Transactions are opened and committed by the caller
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For testing, with foreign-key enforcement,
//!   generated identities, a call journal and fault injection
//!
//! ## Example
//!
//! ```rust
//! use entiflush_backend::{Backend, MemoryBackend, Row};
//!
//! let mut backend = MemoryBackend::new().with_table("accounts", &["id"]);
//! backend.insert("accounts", &Row::new().with("id", 1i64)).unwrap();
//! let affected = backend.delete("accounts", &Row::new().with("id", 1i64)).unwrap();
//! assert_eq!(affected, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod codec;
mod error;
mod memory;
mod row;

pub use backend::Backend;
pub use codec::{decode_row, encode_row};
pub use error::{BackendError, BackendResult};
pub use memory::{BackendCall, MemoryBackend, Operation};
pub use row::Row;
