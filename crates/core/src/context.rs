//! Explicitly constructed application context.
//!
//! Replaces process-wide globals: every component receives the context at
//! construction instead of reaching for shared statics.

use std::sync::Arc;

use crate::credential::Credential;
use crate::errors::Result;
use crate::events::EventBus;
use crate::storage::{load_credential, LocalStore};

#[derive(Clone)]
pub struct AppContext {
    pub bus: EventBus,
    pub store: Arc<dyn LocalStore>,
    credential: Option<Credential>,
}

impl AppContext {
    /// Build the context, reading the credential slot exactly once.
    pub fn new(bus: EventBus, store: Arc<dyn LocalStore>) -> Result<Self> {
        let credential = load_credential(store.as_ref())?;
        Ok(Self {
            bus,
            store,
            credential,
        })
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryLocalStore, CREDENTIAL_SLOT};

    #[test]
    fn test_credential_is_read_at_construction() {
        let store = Arc::new(MemoryLocalStore::new().with_slot(CREDENTIAL_SLOT, "abc"));
        let ctx = AppContext::new(EventBus::new(), store.clone()).unwrap();

        store.set(CREDENTIAL_SLOT, "changed").unwrap();

        assert_eq!(ctx.credential().map(Credential::expose), Some("abc"));
    }

    #[test]
    fn test_missing_credential() {
        let ctx = AppContext::new(EventBus::new(), Arc::new(MemoryLocalStore::new())).unwrap();
        assert!(ctx.credential().is_none());
    }
}
