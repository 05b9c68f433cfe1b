use std::{collections::HashMap, fs, path::PathBuf, sync::Mutex};

use serde::{Deserialize, Serialize};

use super::LocalStore;
use crate::errors::{Error, Result};

const CURRENT_VERSION: u32 = 1;

/// Slot store backed by a single JSON file.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    lock: Mutex<()>,
}

#[derive(Serialize, Deserialize, Default)]
struct SlotFile {
    version: u32,
    slots: HashMap<String, String>,
}

impl FileLocalStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn with_slots<F>(&self, mut op: F) -> Result<()>
    where
        F: FnMut(&mut HashMap<String, String>),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("Slot store lock poisoned".into()))?;
        let mut slots = self.load_locked()?;
        op(&mut slots);
        self.persist_locked(slots)
    }

    fn read_slots(&self) -> Result<HashMap<String, String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("Slot store lock poisoned".into()))?;
        self.load_locked()
    }

    fn load_locked(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let raw = fs::read(&self.path)?;
        if raw.is_empty() {
            return Ok(HashMap::new());
        }

        let file: SlotFile = serde_json::from_slice(&raw).map_err(|e| {
            Error::StorageCorrupt(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(file.slots)
    }

    fn persist_locked(&self, slots: HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = SlotFile {
            version: CURRENT_VERSION,
            slots,
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.read_slots()?.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> Result<()> {
        self.with_slots(|slots| {
            slots.insert(slot.to_string(), value.to_string());
        })
    }

    fn remove(&self, slot: &str) -> Result<()> {
        self.with_slots(|slots| {
            slots.remove(slot);
        })
    }
}
