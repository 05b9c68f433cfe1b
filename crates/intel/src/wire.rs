//! Wire format of the intelligence API and its normalization into
//! [`IntelligenceSnapshot`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use chainwatch_core::intel::{ChainState, FactionMember, IntelligenceSnapshot, LastAction, UserProfile};
use chainwatch_core::{Error, Result};

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    error: String,
}

#[derive(Deserialize, Default)]
struct RawLife {
    #[serde(default)]
    current: i64,
    #[serde(default)]
    maximum: i64,
}

#[derive(Deserialize, Default)]
struct RawFaction {
    #[serde(default)]
    faction_id: u64,
}

#[derive(Deserialize, Default)]
struct RawChain {
    #[serde(default)]
    current: i64,
    #[serde(default)]
    timeout: i64,
}

/// Member status arrives either as a bare string or as a detail object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStatus {
    Text(String),
    Detail {
        #[serde(default)]
        description: String,
        #[serde(default)]
        state: String,
    },
}

impl Default for RawStatus {
    fn default() -> Self {
        RawStatus::Text(String::new())
    }
}

impl RawStatus {
    fn into_text(self) -> String {
        match self {
            RawStatus::Text(s) => s,
            RawStatus::Detail { description, state } if description.is_empty() => state,
            RawStatus::Detail { description, .. } => description,
        }
    }
}

#[derive(Deserialize, Default)]
struct RawLastAction {
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    relative: String,
}

#[derive(Deserialize)]
struct RawMember {
    #[serde(default)]
    name: String,
    #[serde(default)]
    level: i64,
    #[serde(default)]
    status: RawStatus,
    #[serde(default)]
    last_action: RawLastAction,
}

#[derive(Deserialize)]
struct RawIntel {
    #[serde(default)]
    player_id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    level: i64,
    #[serde(default)]
    life: RawLife,
    #[serde(default)]
    faction: RawFaction,
    #[serde(default)]
    chain: RawChain,
    #[serde(default)]
    members: BTreeMap<String, RawMember>,
    #[serde(default)]
    enemy_members: BTreeMap<String, RawMember>,
}

/// Fail with `ApiError` if the body carries an embedded application error.
pub(crate) fn check_api_error(body: &Value) -> Result<()> {
    match body.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(raw) => {
            let err: ApiErrorBody = serde_json::from_value(raw.clone()).unwrap_or(ApiErrorBody {
                code: -1,
                error: raw.to_string(),
            });
            Err(Error::ApiError(err.code, err.error))
        }
    }
}

/// Normalize a composite response body. Missing sections default to empty.
pub fn decode_snapshot(body: Value) -> Result<IntelligenceSnapshot> {
    check_api_error(&body)?;
    let raw: RawIntel = serde_json::from_value(body)?;

    Ok(IntelligenceSnapshot {
        user: UserProfile {
            id: raw.player_id,
            name: raw.name,
            level: raw.level,
            hp: raw.life.current,
            max_hp: raw.life.maximum,
        },
        chain: ChainState {
            hits: raw.chain.current,
            time_left: raw.chain.timeout,
        },
        faction_id: (raw.faction.faction_id != 0).then_some(raw.faction.faction_id),
        faction_members: convert_members(raw.members),
        enemy_faction_members: convert_members(raw.enemy_members),
    })
}

fn convert_members(raw: BTreeMap<String, RawMember>) -> BTreeMap<String, FactionMember> {
    raw.into_iter()
        .map(|(id, m)| {
            (
                id,
                FactionMember {
                    name: m.name,
                    level: m.level,
                    status: m.status.into_text(),
                    last_action: LastAction {
                        status: m.last_action.status,
                        timestamp: m.last_action.timestamp,
                        relative: m.last_action.relative,
                    },
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_snapshot() {
        let body = json!({
            "player_id": 42,
            "name": "Scout",
            "level": 30,
            "life": {"current": 800, "maximum": 1000},
            "faction": {"faction_id": 9001},
            "chain": {"current": 5, "timeout": 40},
            "members": {
                "1": {
                    "name": "Ally",
                    "level": 55,
                    "status": {"description": "Okay", "state": "Okay"},
                    "last_action": {"status": "Online", "timestamp": 1700000000, "relative": "1 minute ago"}
                }
            },
            "enemy_members": {
                "2": {"name": "Foe", "level": 61, "status": "Hospital"}
            }
        });

        let snapshot = decode_snapshot(body).unwrap();

        assert_eq!(snapshot.user.id, 42);
        assert_eq!(snapshot.user.hp, 800);
        assert_eq!(snapshot.user.max_hp, 1000);
        assert_eq!(snapshot.chain, ChainState { hits: 5, time_left: 40 });
        assert_eq!(snapshot.faction_id, Some(9001));
        assert_eq!(snapshot.faction_members["1"].status, "Okay");
        assert_eq!(snapshot.faction_members["1"].last_action.relative, "1 minute ago");
        assert_eq!(snapshot.enemy_faction_members["2"].status, "Hospital");
        assert_eq!(snapshot.enemy_faction_members["2"].last_action.timestamp, 0);
    }

    #[test]
    fn test_missing_sections_default() {
        let snapshot = decode_snapshot(json!({"player_id": 1})).unwrap();
        assert_eq!(snapshot.faction_id, None);
        assert_eq!(snapshot.chain, ChainState::default());
        assert!(snapshot.faction_members.is_empty());
    }

    #[test]
    fn test_embedded_error() {
        let err = decode_snapshot(json!({"error": {"code": 2, "error": "Incorrect key"}})).unwrap_err();
        assert_eq!(err, Error::ApiError(2, "Incorrect key".into()));
    }

    #[test]
    fn test_status_detail_falls_back_to_state() {
        let status: RawStatus = serde_json::from_value(json!({"state": "Traveling"})).unwrap();
        assert_eq!(status.into_text(), "Traveling");
    }

    #[test]
    fn test_wrong_shape_is_parse_error() {
        let err = decode_snapshot(json!({"chain": "not an object"})).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
