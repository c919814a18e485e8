use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    persist::{PersistResult, StoredObject},
    roll::{Roll, oc_matches},
    types::{ObjectKey, ObjectVersion},
};

/// Content type written for documents and backups.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One packing list: a JSON array of rolls stored under a single key.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Object key.
    pub key: ObjectKey,
    /// Version read from the store; writes are conditional on it.
    pub version: ObjectVersion,
    /// Bytes exactly as read, kept for the backup copy.
    pub raw: Vec<u8>,
    /// Parsed contents in stored order.
    pub rolls: Vec<Roll>,
}

impl Document {
    /// Parses a stored object as a roll array.
    pub fn parse(key: impl Into<ObjectKey>, object: StoredObject) -> PersistResult<Self> {
        let rolls: Vec<Roll> = serde_json::from_slice(&object.bytes)?;
        Ok(Self {
            key: key.into(),
            version: object.version,
            raw: object.bytes,
            rolls,
        })
    }

    /// True when any roll carries `oc` (trimmed, case-insensitive).
    pub fn contains_oc(&self, oc: &str) -> bool {
        self.rolls.iter().any(|roll| oc_matches(&roll.oc, oc))
    }
}

/// Serializes rolls the way documents are stored.
pub fn encode_rolls(rolls: &[Roll]) -> PersistResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(rolls)?)
}

/// Naming convention for documents eligible for reconciliation.
pub fn is_reconcilable_key(key: &str, marker: &str) -> bool {
    key.ends_with(".json") && key.contains(marker) && !key.contains("backup") && !key.contains("_row")
}

/// Key of the pre-mutation copy of `key` at `version`, taken at `ts_ms`.
///
/// `seq` disambiguates copies that would otherwise share a key; zero
/// leaves it off.
pub fn backup_key(key: &str, ts_ms: u64, version: ObjectVersion, seq: u32) -> ObjectKey {
    let stem = key.strip_suffix(".json").unwrap_or(key);
    match seq {
        0 => format!("{stem}_backup_{ts_ms}_v{version}.json"),
        n => format!("{stem}_backup_{ts_ms}_v{version}_{n}.json"),
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
