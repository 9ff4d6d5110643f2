//! AIS report merging.
//!
//! Static/voyage reports (types 5 and 24) only carry identity fields, dynamic
//! reports only carry position data. The merge keeps identity fields alive
//! across both kinds of reports for the same MMSI.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::{AisEntry, AIS_MERGE_FIELDS, AIS_STATIC_TYPES};

/// AIS message type of a report. Decoders deliver it as number or string.
pub(crate) fn report_type(data: &Map<String, Value>) -> Option<u64> {
    match data.get("type")? {
        Value::Number(n) => n.as_u64().or_else(|| {
            // some decoders emit `5.0`
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn is_static_report(data: &Map<String, Value>) -> bool {
    report_type(data)
        .map(|t| AIS_STATIC_TYPES.contains(&t))
        .unwrap_or(false)
}

fn present<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    map.get(field).filter(|v| !v.is_null())
}

/// Merge one report into the stored record for its vessel.
pub(crate) fn merge_report(entry: &mut AisEntry, data: &Map<String, Value>, timestamp: DateTime<Utc>) {
    if is_static_report(data) {
        // only identity fields; dynamic data already stored stays untouched
        for field in AIS_MERGE_FIELDS {
            if let Some(v) = present(data, field) {
                entry.value.insert(field.to_string(), v.clone());
            }
        }
    } else {
        let mut fresh = data.clone();
        for field in AIS_MERGE_FIELDS {
            if present(&fresh, field).is_some() {
                continue;
            }
            if let Some(v) = present(&entry.value, field) {
                fresh.insert(field.to_string(), v.clone());
            }
        }
        if !fresh.contains_key("mmsi") {
            if let Some(mmsi) = entry.value.get("mmsi") {
                fresh.insert("mmsi".to_string(), mmsi.clone());
            }
        }
        entry.value = fresh;
    }
    entry.timestamp = timestamp;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("report must be an object"),
        }
    }

    #[test]
    fn test_report_type_string_or_number() {
        assert_eq!(report_type(&report(json!({"type": "5"}))), Some(5));
        assert_eq!(report_type(&report(json!({"type": 24}))), Some(24));
        assert_eq!(report_type(&report(json!({"type": "x"}))), None);
        assert_eq!(report_type(&report(json!({}))), None);
        assert!(is_static_report(&report(json!({"type": 5}))));
        assert!(!is_static_report(&report(json!({"type": "1"}))));
    }

    #[test]
    fn test_report_type_whole_float() {
        assert_eq!(report_type(&report(json!({"type": 5.0}))), Some(5));
        assert_eq!(report_type(&report(json!({"type": 5.5}))), None);
        assert_eq!(report_type(&report(json!({"type": -5.0}))), None);
        assert!(is_static_report(&report(json!({"type": 24.0}))));

        let now = Utc::now();
        let mut entry = AisEntry::new("211234560", now);
        merge_report(
            &mut entry,
            &report(json!({"type": 1, "mmsi": "211234560", "lat": 54.1, "lon": 10.2})),
            now,
        );
        merge_report(
            &mut entry,
            &report(json!({"type": 5.0, "shipname": "ALBATROS", "lat": 0.0})),
            now,
        );
        assert_eq!(entry.value["shipname"], "ALBATROS");
        assert_eq!(entry.value["lat"], 54.1);
    }

    #[test]
    fn test_static_report_keeps_dynamic_fields() {
        let now = Utc::now();
        let mut entry = AisEntry::new("211234560", now);
        merge_report(
            &mut entry,
            &report(json!({"type": 1, "mmsi": "211234560", "lat": 54.1, "lon": 10.2})),
            now,
        );
        merge_report(
            &mut entry,
            &report(json!({"type": 5, "shipname": "ALBATROS", "lat": 0.0, "draught": 3.1})),
            now,
        );

        assert_eq!(entry.value["shipname"], "ALBATROS");
        assert_eq!(entry.value["lat"], 54.1);
        assert_eq!(entry.value["type"], 1);
        assert!(!entry.value.contains_key("draught"));
    }

    #[test]
    fn test_dynamic_report_replaces_and_backfills() {
        let now = Utc::now();
        let mut entry = AisEntry::new("211234560", now);
        merge_report(
            &mut entry,
            &report(json!({"type": "5", "shipname": "ALBATROS", "callsign": "DA1234"})),
            now,
        );
        merge_report(
            &mut entry,
            &report(json!({"type": "1", "mmsi": "211234560", "speed": 4.2, "callsign": "DB9999"})),
            now,
        );

        assert_eq!(entry.value["speed"], 4.2);
        assert_eq!(entry.value["shipname"], "ALBATROS");
        // a field carried by the fresh report wins over the stored one
        assert_eq!(entry.value["callsign"], "DB9999");

        merge_report(&mut entry, &report(json!({"type": "3", "mmsi": "211234560"})), now);
        assert!(!entry.value.contains_key("speed"));
        assert_eq!(entry.value["callsign"], "DB9999");
    }

    #[test]
    fn test_null_field_is_backfilled() {
        let now = Utc::now();
        let mut entry = AisEntry::new("1", now);
        merge_report(&mut entry, &report(json!({"type": 5, "shipname": "X"})), now);
        merge_report(&mut entry, &report(json!({"type": 1, "shipname": null})), now);
        assert_eq!(entry.value["shipname"], "X");
        assert_eq!(entry.value["mmsi"], "1");
    }
}
