//! Entity batches, write ordering and identity propagation.
//!
//! An [`EntityBatch`] holds the pending inserts, updates and deletes for one
//! entity type. When it is written, inserts are ordered parents first and
//! deletes children first for self-referencing types. Identities generated
//! by the backend are recorded in the batch's [`IdentityMap`] and used to
//! rewrite placeholder keys, both in the same batch and in dependent batches.

mod identity;
pub(crate) mod ordering;
mod pending;
mod table;

pub use identity::IdentityMap;
pub use pending::{ChangedFields, PendingUpdate};
pub use table::EntityBatch;
