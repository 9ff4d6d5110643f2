use std::sync::Arc;

use anyhow::Context;
use avnav_providers::SignalKFeeder;
use avnav_store::{NavStore, SourceCategory, StoreConfig};
use serde_json::{json, Map, Value};
use tokio::time::{interval, Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const GPS_SOURCE: &str = "demo.gps";
const AIS_SOURCE: &str = "demo.ais";
const GPS_PRIORITY: i32 = 10;

/// Wall clock drift against the monotonic clock that counts as a time step.
const MAX_CLOCK_DRIFT_SECS: i64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,avnav_store=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::from_json_file(&path)
            .with_context(|| format!("loading store configuration from {}", path))?,
        None => StoreConfig::new(30, 1200, "211000000"),
    };
    config.validate()?;
    tracing::info!(
        "store starting: expiry {}s, AIS expiry {}s, own MMSI {:?}",
        config.expiry_period_secs,
        config.ais_expiry_period_secs,
        config.own_mmsi
    );

    let store = Arc::new(NavStore::new(config));

    // Each source claims its keys before it starts writing
    for (key, description) in [
        ("gps.lat", "latitude"),
        ("gps.lon", "longitude"),
        ("gps.speed", "speed over ground"),
        ("gps.course", "course over ground"),
    ] {
        store.register_key(key, description, GPS_SOURCE)?;
    }
    let feeder = SignalKFeeder::new(store.clone(), "signalk", 2);
    feeder.register()?;

    let gps_handle = tokio::spawn(generate_gps(store.clone()));
    let ais_handle = tokio::spawn(generate_ais(store.clone()));
    let signalk_handle = tokio::spawn(feed_signalk(feeder));
    let reader_handle = tokio::spawn(report_state(store.clone()));

    tracing::info!("store ready, press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = gps_handle => {
            tracing::warn!("GPS generator stopped");
        }
        _ = ais_handle => {
            tracing::warn!("AIS generator stopped");
        }
        _ = signalk_handle => {
            tracing::warn!("SignalK feeder stopped");
        }
        _ = reader_handle => {
            tracing::warn!("Reader stopped");
        }
    }

    tracing::info!("final state:\n{}", store);
    Ok(())
}

/// Simulated GPS receiver moving the boat.
async fn generate_gps(store: Arc<NavStore>) {
    let mut ticker = interval(Duration::from_secs(1));
    let started = Instant::now();
    let mut lat = 54.3233;
    let mut lon = 10.1394;

    loop {
        ticker.tick().await;
        lat += 0.00001;
        lon += 0.00002;
        let t = started.elapsed().as_secs_f64();

        let fix = json!({
            "lat": lat,
            "lon": lon,
            "speed": 3.85 + t.sin() * 0.5,
            "course": 87.0 + t.cos() * 5.0,
        });
        if let Err(e) = store.set_value("gps", fix, GPS_SOURCE, GPS_PRIORITY) {
            tracing::error!("GPS write failed: {}", e);
            break;
        }
    }
}

fn ais_report(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Simulated AIS receiver: position reports every few seconds, a static
/// report now and then, and our own broadcast which the store drops.
async fn generate_ais(store: Arc<NavStore>) {
    let mut ticker = interval(Duration::from_secs(3));
    let targets = [("244660123", "ALBATROS", 54.35, 10.17), ("211987650", "MOEWE", 54.31, 10.12)];
    let own_mmsi = store.config().own_mmsi.clone();
    let mut round: u64 = 0;

    loop {
        ticker.tick().await;
        for (i, (mmsi, name, lat, lon)) in targets.iter().enumerate() {
            let drift = round as f64 * 0.0001 * (i as f64 + 1.0);
            store.set_ais_value(
                mmsi,
                &ais_report(json!({
                    "type": "1",
                    "mmsi": mmsi,
                    "lat": lat + drift,
                    "lon": lon - drift,
                    "speed": 2.5,
                    "course": 270.0,
                })),
                AIS_SOURCE,
            );
            if round % 5 == 0 {
                store.set_ais_value(
                    mmsi,
                    &ais_report(json!({"type": "5", "mmsi": mmsi, "shipname": name, "shiptype": 36})),
                    AIS_SOURCE,
                );
            }
        }
        if !own_mmsi.is_empty() {
            store.set_ais_value(&own_mmsi, &ais_report(json!({"type": "18"})), AIS_SOURCE);
        }
        round += 1;
    }
}

/// Simulated SignalK gateway delivering a self vessel tree.
async fn feed_signalk(feeder: SignalKFeeder) {
    let mut ticker = interval(Duration::from_secs(2));
    loop {
        ticker.tick().await;
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let tree = json!({
            "environment": {
                "depth": {"belowTransducer": {"value": 7.4, "timestamp": now}},
                "wind": {"speedApparent": {"value": 6.2, "timestamp": now}}
            },
            "notifications": {}
        });
        if let Err(e) = feeder.store_tree(&tree) {
            tracing::error!("SignalK write failed: {}", e);
            break;
        }
    }
}

/// Periodic reader, also resetting the store when the wall clock jumps.
async fn report_state(store: Arc<NavStore>) {
    let mut ticker = interval(Duration::from_secs(5));
    let mut last_wall = chrono::Utc::now();
    let mut last_mono = Instant::now();

    loop {
        ticker.tick().await;

        let wall = chrono::Utc::now();
        let mono = Instant::now();
        let wall_delta = (wall - last_wall).num_seconds();
        let mono_delta = mono.duration_since(last_mono).as_secs() as i64;
        if (wall_delta - mono_delta).abs() > MAX_CLOCK_DRIFT_SECS {
            tracing::warn!("system time stepped by {}s, resetting store", wall_delta - mono_delta);
            store.reset();
        }
        last_wall = wall;
        last_mono = mono;

        match store.get_data_by_prefix("gps") {
            Ok(gps) => tracing::info!("gps: {}", gps),
            Err(e) => tracing::error!("gps query failed: {}", e),
        }
        match store.get_data_by_prefix("ais") {
            Ok(ais) => tracing::info!("ais: {} targets", ais["count"]),
            Err(e) => tracing::error!("ais query failed: {}", e),
        }
        tracing::info!(
            "last sources: GPS={} AIS={} OTHER={}",
            store.get_last_source(SourceCategory::Gps),
            store.get_last_source(SourceCategory::Ais),
            store.get_last_source(SourceCategory::Other)
        );
    }
}
