//! Domain models for intelligence snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scope::ScopeId;

/// The polling player's own profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub level: i64,
    pub hp: i64,
    pub max_hp: i64,
}

/// Current chain (streak) state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainState {
    pub hits: i64,
    /// Seconds until the chain breaks.
    pub time_left: i64,
}

impl ChainState {
    /// A streak is in progress while it has hits and time left.
    pub fn is_active(&self) -> bool {
        self.hits > 0 && self.time_left > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAction {
    #[serde(default)]
    pub status: String,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Human-readable "5 minutes ago".
    #[serde(default)]
    pub relative: String,
}

/// One roster entry, keyed by member id in the snapshot maps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactionMember {
    pub name: String,
    pub level: i64,
    pub status: String,
    pub last_action: LastAction,
}

/// Point-in-time read produced by one poll and dispatched immediately.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceSnapshot {
    pub user: UserProfile,
    pub chain: ChainState,
    #[serde(default)]
    pub faction_id: Option<u64>,
    #[serde(default)]
    pub faction_members: BTreeMap<String, FactionMember>,
    #[serde(default)]
    pub enemy_faction_members: BTreeMap<String, FactionMember>,
}

impl IntelligenceSnapshot {
    /// Scope this snapshot belongs to, if the player is in a faction.
    pub fn scope_id(&self) -> Option<ScopeId> {
        self.faction_id.and_then(ScopeId::new)
    }
}
