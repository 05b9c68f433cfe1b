//! Domain models for shared targets.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result};

/// A lightweight record identifying an opposing player, shared among allies
/// in one scope. Unique by `id` within a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharedTarget {
    pub id: String,
    pub name: String,
    /// Any additional fields supplied by the requester, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Unix milliseconds of the last local write.
    #[serde(default)]
    pub timestamp: i64,
}

impl SharedTarget {
    /// Build a target from a `REQUEST_ADD_SHARED_TARGET` payload.
    ///
    /// Returns `None` when the id or name is missing or empty, or when the id
    /// is not a valid document-store key. Numeric ids are normalized to
    /// strings so they address the same remote path.
    pub fn from_request(payload: &Value, now_ms: i64) -> Option<Self> {
        let fields = payload.as_object()?;

        let id = match fields.get("id")? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if !is_valid_key(&id) {
            return None;
        }
        let name = match fields.get("name")? {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            _ => return None,
        };

        let extra = fields
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "id" | "name" | "timestamp"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(Self {
            id,
            name,
            extra,
            timestamp: now_ms,
        })
    }
}

/// Whether `key` can be used as a single document-store path segment.
///
/// `/` would nest the value in a subtree; `. # $ [ ]` are reserved by the
/// store.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
}

/// Replace the entry with the same id in place, or append.
///
/// Returns true when an existing entry was replaced.
pub fn upsert_target(list: &mut Vec<SharedTarget>, target: SharedTarget) -> bool {
    match list.iter_mut().find(|t| t.id == target.id) {
        Some(existing) => {
            *existing = target;
            true
        }
        None => {
            list.push(target);
            false
        }
    }
}

/// Serialized form used to decide whether a remote list differs from the
/// local one. Order-insensitive: entries are compared sorted by id.
pub fn canonical_json(list: &[SharedTarget]) -> Result<String> {
    let mut sorted: Vec<&SharedTarget> = list.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(serde_json::to_string(&sorted)?)
}

/// Decode the remote `targets` subtree into a list sorted by id.
///
/// The store holds a map of id to target; a `null` subtree is an empty list.
/// Stores that collapse small integer keys into arrays are handled too.
/// Entries that do not decode are skipped with a warning.
pub fn targets_from_remote(value: &Value) -> Result<Vec<SharedTarget>> {
    let entries: Vec<(String, &Value)> = match value {
        Value::Null => Vec::new(),
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => {
            return Err(Error::ParseError(format!(
                "expected targets map, got {}",
                other
            )))
        }
    };

    let mut targets = Vec::with_capacity(entries.len());
    for (key, raw) in entries {
        let mut raw = raw.clone();
        if let Value::Object(fields) = &mut raw {
            let id = fields
                .entry("id")
                .or_insert_with(|| Value::String(key.clone()));
            if let Value::Number(n) = id {
                *id = Value::String(n.to_string());
            }
        }
        match serde_json::from_value::<SharedTarget>(raw) {
            Ok(target) => targets.push(target),
            Err(e) => warn!("Skipping malformed remote target '{}': {}", key, e),
        }
    }

    targets.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(targets)
}
