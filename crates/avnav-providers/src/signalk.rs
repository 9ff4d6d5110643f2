//! SignalK data adapter.
//!
//! Feeds a SignalK full data model into the store:
//! - Own vessel data is written below `gps.signalk`, one key per leaf
//! - Other vessels carrying an MMSI become AIS targets
//!
//! A SignalK leaf is an object with a `value` and usually a `timestamp`:
//!
//! ```json
//! {"navigation": {"speedOverGround": {"value": 3.85, "timestamp": "2024-01-17T10:30:00.000Z"}}}
//! ```

use std::sync::Arc;

use avnav_store::{NavStore, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Store prefix owned by the SignalK adapter.
pub const SIGNALK_PATH: &str = "gps.signalk";

/// How a SignalK value is turned into an AIS attribute.
#[derive(Debug, Clone, Copy)]
enum Convert {
    Plain,
    RadToDeg,
    Field(&'static str),
    AisClass,
}

/// AIS attribute, SignalK path below the vessel, conversion.
const AIS_PATH_MAP: [(&str, &str, Convert); 10] = [
    ("mmsi", "mmsi", Convert::Plain),
    ("shipname", "name", Convert::Plain),
    ("speed", "navigation.speedOverGround", Convert::Plain),
    ("course", "navigation.courseOverGroundTrue", Convert::RadToDeg),
    ("callsign", "communication.callsignVhf", Convert::Plain),
    ("shiptype", "design.aisShipType", Convert::Field("id")),
    ("lon", "navigation.position", Convert::Field("longitude")),
    ("lat", "navigation.position", Convert::Field("latitude")),
    ("destination", "navigation.destination", Convert::Plain),
    ("type", "sensors.ais.class", Convert::AisClass),
];

impl Convert {
    fn apply(&self, value: &Value) -> Option<Value> {
        match self {
            Convert::Plain => Some(value.clone()),
            Convert::RadToDeg => value.as_f64().map(|rad| Value::from(rad.to_degrees())),
            Convert::Field(name) => value.get(*name).cloned(),
            Convert::AisClass => match value.as_str() {
                Some("A") => Some(Value::from(1)),
                Some("B") => Some(Value::from(18)),
                _ => Some(value.clone()),
            },
        }
    }
}

fn lookup<'a>(node: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(node, |current, segment| current.get(segment))
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let text = value?.as_str()?;
    match DateTime::parse_from_rfc3339(text) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            debug!("unparseable SignalK timestamp {}: {}", text, e);
            None
        }
    }
}

/// Writes SignalK data into a shared store.
pub struct SignalKFeeder {
    store: Arc<NavStore>,
    source: String,
    priority: i32,
}

impl SignalKFeeder {
    /// Create a feeder. Store priority is the configured priority times ten.
    pub fn new(store: Arc<NavStore>, source: &str, priority: i32) -> Self {
        Self {
            store,
            source: source.to_string(),
            priority: priority.saturating_mul(10),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Claim the `gps.signalk.*` namespace. Call once at startup.
    pub fn register(&self) -> Result<()> {
        self.store
            .register_key(&format!("{}.*", SIGNALK_PATH), "signalK", &self.source)
    }

    /// True if `timestamp` is older than the store's value expiry period.
    pub fn is_outdated(&self, timestamp: Option<&Value>) -> bool {
        match parse_timestamp(timestamp) {
            Some(ts) => ts < self.store.value_cutoff(),
            None => false,
        }
    }

    /// Write every current leaf of a self vessel tree. Returns the number of
    /// leaves handed to the store.
    pub fn store_tree(&self, root: &Value) -> Result<usize> {
        let mut count = 0;
        self.store_node(root, None, &mut count)?;
        debug!("stored {} SignalK leaves from {}", count, self.source);
        Ok(count)
    }

    fn store_node(&self, node: &Value, prefix: Option<&str>, count: &mut usize) -> Result<()> {
        let map = match node.as_object() {
            Some(map) => map,
            None => return Ok(()),
        };
        if let (Some(value), Some(path)) = (map.get("value"), prefix) {
            if self.is_outdated(map.get("timestamp")) {
                debug!("ignore outdated value {}", path);
                return Ok(());
            }
            self.store.set_value(
                &format!("{}.{}", SIGNALK_PATH, path),
                value.clone(),
                &self.source,
                self.priority,
            )?;
            *count += 1;
            return Ok(());
        }
        for (key, item) in map {
            if key == "notifications" || !item.is_object() {
                continue;
            }
            let path = match prefix {
                Some(p) => format!("{}.{}", p, key),
                None => key.clone(),
            };
            self.store_node(item, Some(&path), count)?;
        }
        Ok(())
    }

    /// Convert one SignalK vessel into an AIS report and its newest timestamp.
    ///
    /// Returns `None` for vessels without an MMSI.
    pub fn vessel_to_ais(vessel: &Value) -> Option<(String, Map<String, Value>, Option<DateTime<Utc>>)> {
        let mmsi = match vessel.get("mmsi")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let mut report = Map::new();
        let mut newest: Option<DateTime<Utc>> = None;
        for (field, path, convert) in AIS_PATH_MAP {
            let Some(item) = lookup(vessel, path) else {
                continue;
            };
            let raw = match item {
                Value::Object(leaf) => {
                    if let Some(ts) = parse_timestamp(leaf.get("timestamp")) {
                        newest = Some(newest.map_or(ts, |n| n.max(ts)));
                    }
                    match leaf.get("value") {
                        Some(v) => v,
                        None => continue,
                    }
                }
                other => other,
            };
            if raw.is_null() {
                continue;
            }
            if let Some(value) = convert.apply(raw) {
                report.insert(field.to_string(), value);
            }
        }
        report.insert("mmsi".to_string(), Value::String(mmsi.clone()));
        Some((mmsi, report, newest))
    }

    /// Feed all vessels of a SignalK `vessels` object as AIS targets.
    ///
    /// Vessels whose newest data is older than the AIS expiry period are
    /// skipped. Returns the number of targets fed.
    pub fn feed_vessels(&self, vessels: &Value) -> usize {
        let Some(vessels) = vessels.as_object() else {
            return 0;
        };
        let oldest = self.store.ais_cutoff();
        let mut fed = 0;
        for (id, vessel) in vessels {
            if !id.contains("mmsi") {
                continue;
            }
            let Some((mmsi, report, newest)) = Self::vessel_to_ais(vessel) else {
                continue;
            };
            if newest.map(|ts| ts < oldest).unwrap_or(false) {
                debug!("ignore ais mmsi={} - too old", mmsi);
                continue;
            }
            self.store.add_ais_item(&mmsi, &report, &self.source, newest);
            fed += 1;
        }
        info!("read {} AIS targets from {}", fed, self.source);
        fed
    }
}
