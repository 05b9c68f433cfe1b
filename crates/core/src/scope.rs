//! Synchronization scope identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier partitioning shared state into independent synchronization
/// domains. Discovered from the first snapshot carrying a nonzero faction id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Returns `None` for the zero id, which means "no faction".
    pub fn new(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// `scope/{id}/targets`
    pub fn targets_path(self) -> String {
        format!("scope/{}/targets", self.0)
    }

    /// `scope/{id}/targets/{target_id}`
    pub fn target_path(self, target_id: &str) -> String {
        format!("scope/{}/targets/{}", self.0, target_id)
    }

    /// `scope/{id}/orders`
    pub fn orders_path(self) -> String {
        format!("scope/{}/orders", self.0)
    }

    /// `scope/{id}/members`
    pub fn members_path(self) -> String {
        format!("scope/{}/members", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
