//! Restart flow: slot file -> context -> shared target list.

use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use chainwatch_core::events::EventBus;
use chainwatch_core::storage::{
    load_shared_targets, save_credential, save_shared_targets, FileLocalStore, LocalStore,
    SHARED_TARGETS_SLOT,
};
use chainwatch_core::targets::{upsert_target, SharedTarget};
use chainwatch_core::{AppContext, Credential};

#[test]
fn state_survives_a_restart() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("data").join("chainwatch.json");

    {
        let store = FileLocalStore::new(path.clone());
        save_credential(&store, &Credential::new("secret-key").unwrap()).unwrap();

        let mut list = Vec::new();
        upsert_target(
            &mut list,
            SharedTarget::from_request(&json!({"id": 7, "name": "Foo", "note": "tank"}), 1).unwrap(),
        );
        save_shared_targets(&store, &list).unwrap();
    }

    let store: Arc<dyn LocalStore> = Arc::new(FileLocalStore::new(path));
    let ctx = AppContext::new(EventBus::new(), store).unwrap();
    assert_eq!(ctx.credential().unwrap().expose(), "secret-key");

    let list = load_shared_targets(ctx.store.as_ref());
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, "7");
    assert_eq!(list[0].extra["note"], "tank");
}

#[test]
fn corrupt_target_slot_is_reset_on_load() {
    let tmp = tempdir().unwrap();
    let store = FileLocalStore::new(tmp.path().join("cw.json"));
    store.set(SHARED_TARGETS_SLOT, "{broken").unwrap();

    assert!(load_shared_targets(&store).is_empty());
    assert_eq!(store.get(SHARED_TARGETS_SLOT).unwrap().as_deref(), Some("[]"));
}
