use std::collections::HashMap;
use std::sync::Mutex;

use super::LocalStore;
use crate::errors::{Error, Result};

/// In-memory slot store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot.
    pub fn with_slot(self, slot: &str, value: &str) -> Self {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(slot.to_string(), value.to_string());
        }
        self
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| Error::Storage("Slot store lock poisoned".into()))?;
        Ok(slots.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::Storage("Slot store lock poisoned".into()))?;
        slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::Storage("Slot store lock poisoned".into()))?;
        slots.remove(slot);
        Ok(())
    }
}
