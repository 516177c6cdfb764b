//! Structural equality, ordering and hashing over entity references.
//!
//! A [`StructuralComparer`] is compiled once from an ordered list of field
//! selectors and reused for every comparison of that key shape. It works on
//! type-erased references (`&dyn Any`) and hands out a zero-cost
//! [`TypedComparer`] for callers that know the type. [`ComparerCache`] shares
//! compiled comparers across batches and threads.

mod cache;
mod structural;
mod typed;

pub use cache::ComparerCache;
pub use structural::StructuralComparer;
pub use typed::{KeyRef, TypedComparer};
