//! Roster projection mirrored to the shared store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::FactionMember;

/// Flattened member record written under `scope/{id}/members`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub level: i64,
    pub status: String,
    pub last_seen: String,
    /// Unix milliseconds at projection time.
    pub updated: i64,
}

impl RosterEntry {
    pub fn from_member(id: &str, member: &FactionMember, now_ms: i64) -> Self {
        let last_seen = if member.last_action.relative.is_empty() {
            member.last_action.timestamp.to_string()
        } else {
            member.last_action.relative.clone()
        };

        Self {
            id: id.to_string(),
            name: member.name.clone(),
            level: member.level,
            status: member.status.clone(),
            last_seen,
            updated: now_ms,
        }
    }
}

/// Project a faction roster into the mirrored shape, keyed by member id.
pub fn project_roster(
    members: &BTreeMap<String, FactionMember>,
    now_ms: i64,
) -> BTreeMap<String, RosterEntry> {
    members
        .iter()
        .map(|(id, member)| (id.clone(), RosterEntry::from_member(id, member, now_ms)))
        .collect()
}
