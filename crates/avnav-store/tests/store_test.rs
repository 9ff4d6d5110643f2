//! Integration tests for the navigational store.
//!
//! These tests drive a shared store from many threads and check that the
//! observable state converges independent of interleaving.

use std::sync::Arc;
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use avnav_store::{ManualClock, NavStore, SourceCategory, StoreConfig, StoreError};
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

fn test_store(own_mmsi: &str) -> (Arc<NavStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let store = NavStore::with_clock(StoreConfig::new(10, 300, own_mmsi), clock.clone());
    (Arc::new(store), clock)
}

fn report(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("report must be an object"),
    }
}

#[test]
fn test_concurrent_writers_converge_to_highest_priority() {
    for _ in 0..20 {
        let (store, _) = test_store("");
        store.register_key("gps.lat", "latitude", "test").unwrap();

        thread::scope(|s| {
            for priority in 0..16 {
                let store = &store;
                s.spawn(move || {
                    for _ in 0..50 {
                        store
                            .set_value("gps.lat", json!(priority), &format!("writer{}", priority), priority)
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(store.get_single_value("gps.lat"), Some(json!(15)));
        assert_eq!(store.get_last_source(SourceCategory::Gps), "writer15");
    }
}

#[test]
fn test_concurrent_readers_and_writers() {
    let (store, _) = test_store("");
    store.register_key("nav.*", "navigation", "test").unwrap();

    thread::scope(|s| {
        for w in 0..4 {
            let store = &store;
            s.spawn(move || {
                for i in 0..200 {
                    store
                        .set_value(&format!("nav.w{}.v{}", w, i % 10), json!(i), "writer", 1)
                        .unwrap();
                }
            });
        }
        for _ in 0..4 {
            let store = &store;
            s.spawn(move || {
                for _ in 0..200 {
                    let view = store.get_data_by_prefix("nav").unwrap();
                    assert!(view.is_object());
                }
            });
        }
    });

    let view = store.get_data_by_prefix("nav").unwrap();
    assert_eq!(view.as_object().unwrap().len(), 4);
    assert_eq!(view["w0"].as_object().unwrap().len(), 10);
}

#[test]
fn test_registration_races_with_writes() {
    let (store, _) = test_store("");

    let (written, registered) = thread::scope(|s| {
        let writer = &store;
        let writes = s.spawn(move || {
            // writes before registration fail, after it they must succeed
            let deadline = Instant::now() + StdDuration::from_secs(5);
            while Instant::now() < deadline {
                if writer.set_value("sky.sat.count", json!(7), "gpsd", 0).is_ok() {
                    return true;
                }
                thread::yield_now();
            }
            false
        });
        let registrar = &store;
        let registration = s.spawn(move || registrar.register_key("sky.*", "satellites", "gpsd"));
        (writes.join().unwrap(), registration.join().unwrap())
    });

    assert_eq!(registered, Ok(()));
    assert!(written, "write never succeeded after registration");
    assert_eq!(store.get_single_value("sky.sat.count"), Some(json!(7)));
}

#[test]
fn test_priority_monotonicity() {
    let (store, clock) = test_store("");
    store.register_key("depth.below", "depth", "test").unwrap();

    store.set_value("depth.below", json!(1.0), "a", 20).unwrap();

    clock.advance(Duration::seconds(3));
    store.set_value("depth.below", json!(2.0), "b", 19).unwrap();
    store.set_value("depth.below", json!(3.0), "c", 20).unwrap();
    assert_eq!(store.get_single_value("depth.below"), Some(json!(1.0)));

    store.set_value("depth.below", json!(4.0), "d", 21).unwrap();
    assert_eq!(store.get_single_value("depth.below"), Some(json!(4.0)));

    // after expiry any priority wins
    clock.advance(Duration::seconds(11));
    store.set_value("depth.below", json!(5.0), "e", -5).unwrap();
    assert_eq!(store.get_single_value("depth.below"), Some(json!(5.0)));
}

#[test]
fn test_equal_priority_sources_keep_first_writer() {
    let (store, clock) = test_store("");
    store.register_key("gps.speed", "speed", "test").unwrap();

    store.set_value("gps.speed", json!(4.1), "first", 10).unwrap();
    clock.advance(Duration::seconds(1));
    store.set_value("gps.speed", json!(9.9), "second", 10).unwrap();
    assert_eq!(store.get_single_value("gps.speed"), Some(json!(4.1)));

    // once the first writer's entry has gone stale the second one takes over
    clock.advance(Duration::seconds(10));
    store.set_value("gps.speed", json!(9.9), "second", 10).unwrap();
    assert_eq!(store.get_single_value("gps.speed"), Some(json!(9.9)));
    assert_eq!(store.get_last_source(SourceCategory::Gps), "second");
}

#[test]
fn test_wildcard_conflicts() {
    let (store, _) = test_store("");
    store.register_key("a.*", "wild", "one").unwrap();
    assert!(matches!(
        store.register_key("a.b", "exact", "two"),
        Err(StoreError::KeyConflict { .. })
    ));

    let (store, _) = test_store("");
    store.register_key("a.b", "exact", "one").unwrap();
    assert!(matches!(
        store.register_key("a.*", "wild", "two"),
        Err(StoreError::KeyConflict { .. })
    ));
}

#[test]
fn test_ais_static_data_survives_dynamic_reports() {
    let (store, _) = test_store("211000000");
    let mmsi = "244660000";

    store.set_ais_value(mmsi, &report(json!({"type": "1", "mmsi": mmsi, "lat": 53.5, "lon": 8.1})), "nmea");
    store.set_ais_value(
        mmsi,
        &report(json!({"type": "5", "mmsi": mmsi, "shipname": "X", "destination": "BREMERHAVEN"})),
        "nmea",
    );
    store.set_ais_value(mmsi, &report(json!({"type": "1", "mmsi": mmsi, "lat": 53.6, "lon": 8.2})), "nmea");

    let targets = store.get_ais_data();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0]["shipname"], "X");
    assert_eq!(targets[0]["destination"], "BREMERHAVEN");
    assert_eq!(targets[0]["lat"], 53.6);

    store.set_ais_value("211000000", &report(json!({"type": "1", "lat": 0.0})), "nmea");
    assert_eq!(store.get_ais_counter(), 1);
}

#[test]
fn test_independent_instances() {
    let (first, _) = test_store("");
    let (second, _) = test_store("");
    first.register_key("gps.lat", "latitude", "a").unwrap();
    second.register_key("gps.lat", "latitude", "b").unwrap();

    first.set_value("gps.lat", json!(1), "a", 0).unwrap();
    assert_eq!(second.get_single_value("gps.lat"), None);
    assert_eq!(second.key_owner("gps.lat").as_deref(), Some("b"));
}

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("avnav-store-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"expiryPeriodSecs": 5, "aisExpiryPeriodSecs": 90}"#).unwrap();
    let config = StoreConfig::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let store = NavStore::new(config);
    assert_eq!(store.expiry_period(), Duration::seconds(5));
    assert_eq!(store.ais_expiry_period(), Duration::seconds(90));
}
