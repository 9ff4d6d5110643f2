//! Data model types held by the navigational store.
//!
//! Entries are replaced wholesale on every accepted write. Only the AIS
//! store merges into an existing record (see the `ais` module).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Base key for own-ship position data.
pub const BASE_KEY_GPS: &str = "gps";

/// Base key for AIS targets.
pub const BASE_KEY_AIS: &str = "ais";

/// Base key for satellite data.
pub const BASE_KEY_SKY: &str = "sky";

/// AIS attributes carried over between static and dynamic reports.
pub const AIS_MERGE_FIELDS: [&str; 5] = ["imo_id", "callsign", "shipname", "shiptype", "destination"];

/// AIS message types treated as static/voyage reports.
pub const AIS_STATIC_TYPES: [u64; 2] = [5, 24];

/// Coarse category used for last-writer tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceCategory {
    Gps,
    Ais,
    Other,
}

impl SourceCategory {
    /// Category for a value key: GPS for the `gps` subtree, OTHER otherwise.
    pub fn for_key(key: &str) -> Self {
        if key == BASE_KEY_GPS || key.starts_with("gps.") {
            SourceCategory::Gps
        } else {
            SourceCategory::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Gps => "GPS",
            SourceCategory::Ais => "AIS",
            SourceCategory::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The latest accepted value for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub priority: i32,
}

impl Entry {
    pub fn new(value: Value, timestamp: DateTime<Utc>, source: &str, priority: i32) -> Self {
        Self {
            value,
            timestamp,
            source: source.to_string(),
            priority,
        }
    }

    /// True if the entry was written before `cutoff`.
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp < cutoff
    }
}

/// Merged AIS record for one vessel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AisEntry {
    /// Merged attribute map, always carrying `mmsi`.
    pub value: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub source: SourceCategory,
}

impl AisEntry {
    /// Create an empty record holding only the MMSI.
    pub fn new(mmsi: &str, timestamp: DateTime<Utc>) -> Self {
        let mut value = Map::new();
        value.insert("mmsi".to_string(), Value::String(mmsi.to_string()));
        Self {
            value,
            timestamp,
            source: SourceCategory::Ais,
        }
    }

    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp < cutoff
    }
}

/// A registered key descriptor, as returned by `NavStore::registered_keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredKey {
    pub key: String,
    pub description: String,
    /// Owning source id.
    pub owner: String,
    /// True if the key contains a `*` segment.
    pub wildcard: bool,
}

/// Full store key for an AIS target.
pub fn ais_key(mmsi: &str) -> String {
    format!("{}.{}", BASE_KEY_AIS, mmsi)
}
