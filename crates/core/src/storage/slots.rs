//! Typed accessors for the well-known slots.

use log::warn;

use super::{LocalStore, CREDENTIAL_SLOT, SHARED_TARGETS_SLOT};
use crate::credential::Credential;
use crate::errors::{Error, Result};
use crate::targets::SharedTarget;

pub fn load_credential(store: &dyn LocalStore) -> Result<Option<Credential>> {
    Ok(store
        .get(CREDENTIAL_SLOT)?
        .and_then(|raw| Credential::new(&raw)))
}

pub fn save_credential(store: &dyn LocalStore, credential: &Credential) -> Result<()> {
    store.set(CREDENTIAL_SLOT, credential.expose())
}

/// Load the persisted shared target list.
///
/// A slot that does not decode is reset to an empty list and logged; the
/// caller always gets a usable list.
pub fn load_shared_targets(store: &dyn LocalStore) -> Vec<SharedTarget> {
    let raw = match store.get(SHARED_TARGETS_SLOT) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read shared targets, starting empty: {}", e);
            return Vec::new();
        }
    };

    match decode_targets(&raw) {
        Ok(targets) => targets,
        Err(e) => {
            warn!("{}; resetting shared targets", e);
            if let Err(e) = store.set(SHARED_TARGETS_SLOT, "[]") {
                warn!("Failed to reset shared targets slot: {}", e);
            }
            Vec::new()
        }
    }
}

pub fn save_shared_targets(store: &dyn LocalStore, targets: &[SharedTarget]) -> Result<()> {
    let json = serde_json::to_string(targets)?;
    store.set(SHARED_TARGETS_SLOT, &json)
}

fn decode_targets(raw: &str) -> Result<Vec<SharedTarget>> {
    serde_json::from_str(raw).map_err(|e| Error::StorageCorrupt(format!("shared targets: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLocalStore;
    use serde_json::Map;

    #[test]
    fn test_credential_slot() {
        let store = MemoryLocalStore::new();
        assert!(load_credential(&store).unwrap().is_none());

        save_credential(&store, &Credential::new("k3y").unwrap()).unwrap();
        assert_eq!(load_credential(&store).unwrap().unwrap().expose(), "k3y");
    }

    #[test]
    fn test_blank_credential_slot_reads_as_unset() {
        let store = MemoryLocalStore::new().with_slot(CREDENTIAL_SLOT, "  ");
        assert!(load_credential(&store).unwrap().is_none());
    }

    #[test]
    fn test_shared_targets_roundtrip() {
        let store = MemoryLocalStore::new();
        let targets = vec![SharedTarget {
            id: "7".into(),
            name: "Foo".into(),
            extra: Map::new(),
            timestamp: 99,
        }];

        save_shared_targets(&store, &targets).unwrap();
        assert_eq!(load_shared_targets(&store), targets);
    }

    #[test]
    fn test_corrupt_targets_slot_resets_to_empty() {
        let store = MemoryLocalStore::new().with_slot(SHARED_TARGETS_SLOT, "{broken");

        assert!(load_shared_targets(&store).is_empty());
        assert_eq!(store.get(SHARED_TARGETS_SLOT).unwrap().as_deref(), Some("[]"));
    }
}
