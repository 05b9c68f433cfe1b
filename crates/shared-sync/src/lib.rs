//! Chainwatch Sync - shared target list synchronization.
//!
//! Keeps one scope-keyed target list in eventual agreement between every
//! running instance and a path-addressable remote document store:
//!
//! - local writes are applied, persisted and published immediately, then
//!   pushed remotely through a debounced [`WriteQueue`];
//! - every poll period the remote list is pulled and, if it differs, replaces
//!   the local one wholesale (remote wins);
//! - the faction roster is mirrored outward at most once per mirror period;
//! - the scope's orders payload is republished on every poll.

mod document_store;
mod engine;
mod timer;
mod write_queue;

pub use document_store::{DocumentStore, HttpDocumentStore, MemoryDocumentStore, StoreOp};
pub use engine::{SyncConfig, SyncEngine};
pub use timer::TimerHandle;
pub use write_queue::{WriteQueue, WriteQueueEntry};
