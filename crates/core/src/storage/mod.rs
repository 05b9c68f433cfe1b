//! Local persistence: a handful of string-keyed slots.
//!
//! Slots are read at startup and written on every mutation. Values are
//! opaque strings; callers own their encoding.

mod file_store;
mod memory_store;
mod slots;

pub use file_store::FileLocalStore;
pub use memory_store::MemoryLocalStore;
pub use slots::*;

use crate::errors::Result;

/// Slot holding the remote API credential.
pub const CREDENTIAL_SLOT: &str = "credential";

/// Slot holding the serialized shared target list.
pub const SHARED_TARGETS_SLOT: &str = "shared_targets";

/// String-keyed persistent slot storage.
pub trait LocalStore: Send + Sync {
    fn get(&self, slot: &str) -> Result<Option<String>>;

    fn set(&self, slot: &str, value: &str) -> Result<()>;

    fn remove(&self, slot: &str) -> Result<()>;
}
